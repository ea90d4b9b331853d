use crate::core::sequence::JobContext;
use crate::domain::model::Record;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// 回傳檔案在儲存空間中的完整位置，用於日誌與執行摘要
    fn location(&self, path: &str) -> String;
}

/// 單一作業的產出
#[derive(Debug, Clone, Default)]
pub struct JobOutput {
    pub records: Vec<Record>,
    pub output_files: Vec<String>,
    pub metadata: Map<String, Value>,
}

#[async_trait]
pub trait HelpdeskJob: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, context: &JobContext) -> Result<JobOutput>;

    fn should_execute(&self, _context: &JobContext) -> bool {
        true
    }
}
