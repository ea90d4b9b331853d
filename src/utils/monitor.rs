//! 以 `--monitor` 開啟：在每個作業前後記錄本行程的 CPU、記憶體與耗時。

#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessesToUpdate, System};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy)]
pub struct ResourceSample {
    pub cpu_usage: f32,
    pub memory_mb: u64,
    pub at: Instant,
}

#[cfg(feature = "cli")]
struct MonitorState {
    system: System,
    peak_memory_mb: u64,
    job_started: Option<ResourceSample>,
}

#[cfg(feature = "cli")]
pub struct JobMonitor {
    pid: Pid,
    run_started: Instant,
    state: Mutex<MonitorState>,
}

#[cfg(feature = "cli")]
impl JobMonitor {
    /// 取不到目前行程 ID 時回傳 `None`，監控直接停用
    pub fn new() -> Option<Self> {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => pid,
            Err(e) => {
                tracing::warn!("⚠️ Resource monitoring unavailable: {}", e);
                return None;
            }
        };

        let monitor = Self {
            pid,
            run_started: Instant::now(),
            state: Mutex::new(MonitorState {
                system: System::new(),
                peak_memory_mb: 0,
                job_started: None,
            }),
        };
        monitor.sample();
        Some(monitor)
    }

    pub fn sample(&self) -> Option<ResourceSample> {
        let mut state = self.state.lock().ok()?;
        state
            .system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        let process = state.system.process(self.pid)?;

        let sample = ResourceSample {
            cpu_usage: process.cpu_usage(),
            memory_mb: process.memory() / 1024 / 1024,
            at: Instant::now(),
        };
        state.peak_memory_mb = state.peak_memory_mb.max(sample.memory_mb);
        Some(sample)
    }

    pub fn peak_memory_mb(&self) -> u64 {
        self.state.lock().map(|s| s.peak_memory_mb).unwrap_or(0)
    }

    pub fn elapsed(&self) -> Duration {
        self.run_started.elapsed()
    }

    pub fn job_started(&self, job_name: &str) {
        let Some(sample) = self.sample() else {
            return;
        };
        tracing::info!(
            "📊 {} starting - CPU: {:.1}%, Memory: {}MB",
            job_name,
            sample.cpu_usage,
            sample.memory_mb
        );
        if let Ok(mut state) = self.state.lock() {
            state.job_started = Some(sample);
        }
    }

    pub fn job_finished(&self, job_name: &str, rows: usize) {
        let Some(sample) = self.sample() else {
            return;
        };
        let started = self
            .state
            .lock()
            .ok()
            .and_then(|mut state| state.job_started.take());

        match started {
            Some(start) => tracing::info!(
                "📊 {} finished - {} rows, CPU: {:.1}%, Memory: {}MB ({:+}MB), Time: {:?}",
                job_name,
                rows,
                sample.cpu_usage,
                sample.memory_mb,
                sample.memory_mb as i64 - start.memory_mb as i64,
                sample.at.duration_since(start.at)
            ),
            None => tracing::info!(
                "📊 {} finished - {} rows, Memory: {}MB",
                job_name,
                rows,
                sample.memory_mb
            ),
        }
    }

    pub fn log_summary(&self, jobs_run: usize) {
        self.sample();
        tracing::info!(
            "📊 Run finished - {} jobs, Total Time: {:?}, Peak Memory: {}MB",
            jobs_run,
            self.elapsed(),
            self.peak_memory_mb()
        );
    }
}

// 非 CLI 建置時沒有 sysinfo，監控一律停用
#[cfg(not(feature = "cli"))]
pub struct JobMonitor;

#[cfg(not(feature = "cli"))]
impl JobMonitor {
    pub fn new() -> Option<Self> {
        None
    }

    pub fn job_started(&self, _job_name: &str) {}

    pub fn job_finished(&self, _job_name: &str, _rows: usize) {}

    pub fn log_summary(&self, _jobs_run: usize) {}
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_peak_tracks_samples() {
        let Some(monitor) = JobMonitor::new() else {
            return;
        };
        monitor.job_started("export");
        if let Some(sample) = monitor.sample() {
            assert!(monitor.peak_memory_mb() >= sample.memory_mb);
        }
        monitor.job_finished("export", 3);
        assert!(monitor.state.lock().unwrap().job_started.is_none());
    }
}
