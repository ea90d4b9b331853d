use clap::Parser;
use deskops::app::{build_job, JobEnv};
use deskops::config::job_config::{JobDefinition, JobKind};
use deskops::config::CliArgs;
use deskops::core::sequence::JobResult;
use deskops::domain::ports::Storage;
use deskops::utils::error::{ErrorSeverity, HelpdeskError};
use deskops::utils::{logger, validation::Validate};
use deskops::{HelpdeskClient, JobFile, JobSequence, LocalStorage};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn exit_code(error: &HelpdeskError) -> i32 {
    match error.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn fail(error: HelpdeskError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        error,
        error.category(),
        error.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", error.recovery_suggestion());
    eprintln!("❌ {}", error.user_friendly_message());
    eprintln!("💡 {}", error.recovery_suggestion());
    if error.is_retryable() {
        eprintln!("🔁 This failure is usually temporary; rerunning the job file may succeed");
    }
    std::process::exit(exit_code(&error));
}

fn selected_jobs<'a>(config: &'a JobFile, args: &CliArgs) -> Vec<&'a JobDefinition> {
    config
        .get_enabled_jobs()
        .into_iter()
        .filter(|job| args.selects(&job.name))
        .collect()
}

fn describe_targets(job: &JobDefinition) -> String {
    let mut sources = Vec::new();
    if !job.ids.is_empty() {
        sources.push(format!("{} inline ids", job.ids.len()));
    }
    if let Some(file) = &job.ids_file {
        sources.push(format!("ids from {}", file));
    }
    if let Some(from_job) = &job.from_job {
        sources.push(format!(
            "'{}' column of {}",
            job.id_field.as_deref().unwrap_or("id"),
            from_job
        ));
    }
    if let JobKind::DeleteContacts(settings) = &job.kind {
        if !settings.emails.is_empty() {
            sources.push(format!("{} inline emails", settings.emails.len()));
        }
        if let Some(file) = &settings.emails_file {
            sources.push(format!("emails from {}", file));
        }
    }
    sources.join(", ")
}

fn display_plan(config: &JobFile, args: &CliArgs, execution_id: &str) {
    println!("📋 Job Run Summary:");
    println!("  Name: {}", config.run.name);
    if let Some(description) = &config.run.description {
        println!("  Description: {}", description);
    }
    println!("  Execution ID: {}", execution_id);
    println!("  On failure: {:?}", config.run.on_failure);
    println!(
        "  Output: {} ({})",
        config.output.directory,
        config
            .output
            .formats
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }
    println!();

    let selected = selected_jobs(config, args);
    println!("📝 Execution Order:");
    for (index, job) in config.jobs.iter().enumerate() {
        let status = if selected.iter().any(|s| s.name == job.name) {
            "✅"
        } else {
            "⏸️"
        };
        println!(
            "  {}. {} {} [{}] - {}",
            index + 1,
            status,
            job.name,
            job.kind.label(),
            job.description.as_deref().unwrap_or("No description")
        );
        let targets = describe_targets(job);
        if !targets.is_empty() {
            println!("     Targets: {}", targets);
        }
    }
    println!();
}

fn display_results(results: &[JobResult], execution_id: &str) {
    println!();
    println!("📊 Execution Results Summary:");
    println!("  Execution ID: {}", execution_id);
    println!("  Completed Jobs: {}", results.len());

    for (index, result) in results.iter().enumerate() {
        match &result.error {
            None => println!(
                "  {}. ✅ {} - {} rows in {:?}",
                index + 1,
                result.job_name,
                result.records.len(),
                result.duration
            ),
            Some(error) => println!("  {}. ❌ {} - {}", index + 1, result.job_name, error),
        }
        for file in &result.output_files {
            println!("     Output: {}", file);
        }
    }
    println!();
}

async fn write_run_summary(
    storage: &LocalStorage,
    execution_id: &str,
    results: &[JobResult],
) -> deskops::Result<String> {
    let mut summary = serde_json::Map::new();
    summary.insert("execution_id".to_string(), execution_id.into());
    summary.insert("timestamp".to_string(), chrono::Utc::now().to_rfc3339().into());
    summary.insert(
        "summary".to_string(),
        serde_json::Value::Object(JobSequence::summary(results)),
    );
    summary.insert(
        "jobs".to_string(),
        serde_json::Value::Array(
            results
                .iter()
                .map(|result| {
                    let mut job = result.metadata.clone();
                    job.insert("name".to_string(), result.job_name.clone().into());
                    job.insert("rows".to_string(), result.records.len().into());
                    job.insert(
                        "duration_ms".to_string(),
                        (result.duration.as_millis() as u64).into(),
                    );
                    if let Some(error) = &result.error {
                        job.insert("error".to_string(), error.clone().into());
                    }
                    serde_json::Value::Object(job)
                })
                .collect(),
        ),
    );

    let file_name = format!("{}_summary.json", execution_id);
    let data = serde_json::to_vec_pretty(&summary)?;
    storage.write_file(&file_name, &data).await?;
    Ok(storage.location(&file_name))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config = match JobFile::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load job file '{}': {}", args.config.display(), e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        let log_file = args
            .log_file
            .clone()
            .or_else(|| config.run.log_file.as_ref().map(PathBuf::from));
        logger::init_cli_logger(args.verbose, log_file.as_deref())?;
    }

    tracing::info!("🚀 Starting deskops");
    tracing::info!("📁 Loaded job file: {}", args.config.display());

    if let Err(e) = config.validate() {
        fail(e);
    }
    if let Err(e) = config.validate_selection(&selected_jobs(&config, &args)) {
        fail(e);
    }

    let execution_id = args
        .execution_id
        .clone()
        .unwrap_or_else(|| format!("run_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S")));

    display_plan(&config, &args, &execution_id);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - no API calls will be made");
        println!("✅ Dry run complete: {} jobs would run.", selected_jobs(&config, &args).len());
        return Ok(());
    }

    let client = match config.client_settings().and_then(HelpdeskClient::new) {
        Ok(client) => Arc::new(client),
        Err(e) => fail(e),
    };
    let storage = LocalStorage::new(&config.output.directory);
    let env = Arc::new(JobEnv::from_config(&config, client, storage.clone()));

    let monitor_enabled = args.monitor || config.run.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let mut sequence = JobSequence::new(execution_id.clone())
        .with_monitoring(monitor_enabled)
        .with_failure_policy(config.run.on_failure);

    for job in selected_jobs(&config, &args) {
        tracing::info!("📦 Setting up job: {} ({})", job.name, job.kind.label());
        sequence.add_job(build_job(job, env.clone()));
    }

    let stop = sequence.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("🛑 Ctrl-C received, finishing the current item before stopping");
            stop.store(true, Ordering::SeqCst);
        }
    });

    tracing::info!("🎬 Starting job sequence with {} jobs", sequence.len());
    let results = match sequence.execute_all().await {
        Ok(results) => results,
        Err(e) => fail(e),
    };

    display_results(&results, &execution_id);
    match write_run_summary(&storage, &execution_id, &results).await {
        Ok(location) => println!("📊 Run summary written to: {}", location),
        Err(e) => tracing::warn!("⚠️ Could not write run summary: {}", e),
    }

    if sequence.stop_handle().load(Ordering::SeqCst) {
        println!("🛑 Run stopped before completion.");
        return Ok(());
    }

    let failed = results.iter().filter(|r| !r.is_success()).count();
    if failed > 0 {
        eprintln!("❌ {} of {} jobs failed", failed, results.len());
        std::process::exit(1);
    }

    println!("✅ All jobs completed successfully!");
    Ok(())
}
