pub mod bulk;
pub mod export;
pub mod sequence;
pub mod xlsx;

pub use crate::domain::model::Record;
pub use crate::domain::ports::{HelpdeskJob, JobOutput, Storage};
pub use crate::utils::error::Result;
