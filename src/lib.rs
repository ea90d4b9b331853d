pub mod adapters;
pub mod app;
pub mod client;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::LocalStorage;
pub use client::{ClientSettings, HelpdeskClient};
pub use config::job_config::JobFile;
pub use core::sequence::{JobContext, JobSequence};
pub use utils::error::{HelpdeskError, Result};
