use clap::Parser;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "deskops")]
#[command(about = "Run helpdesk export and bulk-update jobs described in a TOML job file")]
pub struct CliArgs {
    /// Path to the job file
    #[arg(short, long, default_value = "configs/jobs.toml")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Log system resource usage at job boundaries
    #[arg(long)]
    pub monitor: bool,

    /// Show the execution plan without calling the API
    #[arg(long)]
    pub dry_run: bool,

    /// Run only these jobs (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Skip these jobs (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub skip: Vec<String>,

    /// Execution ID for this run
    #[arg(long)]
    pub execution_id: Option<String>,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Emit JSON logs instead of the compact console format
    #[arg(long)]
    pub json_logs: bool,
}

impl CliArgs {
    /// 套用 `--only` / `--skip` 後是否執行此作業
    pub fn selects(&self, job_name: &str) -> bool {
        let only: HashSet<&str> = self.only.iter().map(|s| s.trim()).collect();
        let skip: HashSet<&str> = self.skip.iter().map(|s| s.trim()).collect();

        (only.is_empty() || only.contains(job_name)) && !skip.contains(job_name)
    }
}
