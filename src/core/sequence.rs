use crate::core::bulk::{new_stop_flag, StopFlag};
use crate::core::export::render_cell;
use crate::domain::model::Record;
use crate::domain::ports::HelpdeskJob;
use crate::utils::error::{HelpdeskError, Result};
use crate::utils::monitor::JobMonitor;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

/// 作業失敗時序列的處理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    Stop,
    Continue,
}

/// 作業執行結果
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_name: String,
    pub records: Vec<Record>,
    pub output_files: Vec<String>,
    pub duration: Duration,
    pub metadata: Map<String, Value>,
    /// 在 `continue` 模式下失敗的作業會保留錯誤訊息
    pub error: Option<String>,
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// 作業間傳遞資料的上下文
#[derive(Debug, Clone)]
pub struct JobContext {
    pub execution_id: String,
    pub previous_results: Vec<JobResult>,
    pub stop: StopFlag,
}

impl JobContext {
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            previous_results: Vec::new(),
            stop: new_stop_flag(),
        }
    }

    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn get_result_by_name(&self, name: &str) -> Option<&JobResult> {
        self.previous_results.iter().find(|r| r.job_name == name)
    }

    /// 前一個作業輸出中某欄位的值（轉成文字），空值略過
    pub fn column_values(&self, job_name: &str, field: &str) -> Result<Vec<String>> {
        let result = self
            .get_result_by_name(job_name)
            .ok_or_else(|| HelpdeskError::JobError {
                job: job_name.to_string(),
                details: "No output available; it must run earlier in the sequence".to_string(),
            })?;

        let values: Vec<String> = result
            .records
            .iter()
            .filter_map(|record| record.get(field))
            .map(render_cell)
            .filter(|value| !value.trim().is_empty())
            .collect();

        if values.len() < result.records.len() {
            tracing::warn!(
                "⚠️ {} of {} rows from '{}' had no '{}' value",
                result.records.len() - values.len(),
                result.records.len(),
                job_name,
                field
            );
        }
        Ok(values)
    }

    pub fn add_result(&mut self, result: JobResult) {
        self.previous_results.push(result);
    }
}

/// 依序執行多個作業
pub struct JobSequence {
    jobs: Vec<Box<dyn HelpdeskJob>>,
    monitor: Option<JobMonitor>,
    execution_id: String,
    on_failure: FailurePolicy,
    stop: StopFlag,
}

impl JobSequence {
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            jobs: Vec::new(),
            monitor: None,
            execution_id: execution_id.into(),
            on_failure: FailurePolicy::Stop,
            stop: new_stop_flag(),
        }
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = if enabled { JobMonitor::new() } else { None };
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn add_job(&mut self, job: Box<dyn HelpdeskJob>) {
        self.jobs.push(job);
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub async fn execute_all(&self) -> Result<Vec<JobResult>> {
        let mut context = JobContext::new(self.execution_id.clone()).with_stop_flag(self.stop.clone());

        for job in &self.jobs {
            if context.is_stopped() {
                tracing::warn!("🛑 Stop requested, not starting job: {}", job.name());
                break;
            }

            if !job.should_execute(&context) {
                tracing::info!("⏭️ Skipping job: {} (condition not met)", job.name());
                continue;
            }

            tracing::info!("▶️ Running job: {}", job.name());
            if let Some(monitor) = &self.monitor {
                monitor.job_started(job.name());
            }
            let start_time = Instant::now();

            match job.run(&context).await {
                Ok(output) => {
                    let result = JobResult {
                        job_name: job.name().to_string(),
                        records: output.records,
                        output_files: output.output_files,
                        duration: start_time.elapsed(),
                        metadata: output.metadata,
                        error: None,
                    };

                    tracing::info!(
                        "✅ Job finished: {} (rows: {}, files: {}, duration: {:?})",
                        result.job_name,
                        result.records.len(),
                        result.output_files.len(),
                        result.duration
                    );
                    context.add_result(result);
                }
                Err(e) => {
                    let retryable = e.is_retryable();
                    tracing::error!("❌ Job '{}' failed: {} (retryable: {})", job.name(), e, retryable);
                    match self.on_failure {
                        FailurePolicy::Stop => {
                            return Err(HelpdeskError::JobError {
                                job: job.name().to_string(),
                                details: e.to_string(),
                            });
                        }
                        FailurePolicy::Continue => {
                            let mut metadata = Map::new();
                            metadata.insert("retryable".to_string(), retryable.into());
                            context.add_result(JobResult {
                                job_name: job.name().to_string(),
                                records: Vec::new(),
                                output_files: Vec::new(),
                                duration: start_time.elapsed(),
                                metadata,
                                error: Some(e.to_string()),
                            });
                        }
                    }
                }
            }

            if let Some(monitor) = &self.monitor {
                let rows = context.previous_results.last().map_or(0, |r| r.records.len());
                monitor.job_finished(job.name(), rows);
            }
        }

        if let Some(monitor) = &self.monitor {
            monitor.log_summary(context.previous_results.len());
        }

        Ok(context.previous_results)
    }

    pub fn summary(results: &[JobResult]) -> Map<String, Value> {
        let mut summary = Map::new();

        let total_records: usize = results.iter().map(|r| r.records.len()).sum();
        let total_duration: Duration = results.iter().map(|r| r.duration).sum();
        let failed: Vec<Value> = results
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| Value::String(r.job_name.clone()))
            .collect();
        let files: Vec<Value> = results
            .iter()
            .flat_map(|r| r.output_files.iter().cloned().map(Value::String))
            .collect();

        summary.insert("total_jobs".to_string(), results.len().into());
        summary.insert("total_records".to_string(), total_records.into());
        summary.insert(
            "total_duration_ms".to_string(),
            (total_duration.as_millis() as u64).into(),
        );
        summary.insert(
            "executed_jobs".to_string(),
            Value::Array(
                results
                    .iter()
                    .map(|r| Value::String(r.job_name.clone()))
                    .collect(),
            ),
        );
        summary.insert("failed_jobs".to_string(), Value::Array(failed));
        summary.insert("output_files".to_string(), Value::Array(files));
        summary
    }
}
