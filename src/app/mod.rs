pub mod jobs;

pub use jobs::{build_job, JobEnv};
