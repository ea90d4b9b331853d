//! 批次寫入：每個 ID 一次寫入請求，依序執行，單筆失敗不影響後續。

use crate::client::{ApiRequest, HelpdeskClient};
use crate::domain::model::Record;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 協作式停止旗標，在兩筆之間檢查
pub type StopFlag = Arc<AtomicBool>;

pub fn new_stop_flag() -> StopFlag {
    Arc::new(AtomicBool::new(false))
}

#[derive(Debug, Clone)]
pub struct BulkOptions {
    pub delay_between: Duration,
    pub dedupe_ids: bool,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            delay_between: Duration::from_millis(250),
            dedupe_ids: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum MutationPlan {
    Write { request: ApiRequest, context: Record },
    Skip { reason: String, context: Record },
}

impl MutationPlan {
    pub fn write(request: ApiRequest) -> Self {
        MutationPlan::Write {
            request,
            context: Record::new(),
        }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        MutationPlan::Skip {
            reason: reason.into(),
            context: Record::new(),
        }
    }

    /// 附加到結果列的欄位，例如聯絡人名稱或目標區域
    pub fn with_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        match &mut self {
            MutationPlan::Write { context, .. } | MutationPlan::Skip { context, .. } => {
                context.insert(key, value)
            }
        }
        self
    }
}

#[async_trait]
pub trait MutationPlanner<K: Send + Sync>: Send + Sync {
    /// 決定這筆要送出的寫入，或略過的原因；這裡可以先讀取現有資料
    async fn plan(&self, client: &HelpdeskClient, key: &K) -> Result<MutationPlan>;

    /// 計畫會附加的欄位，結果表格依此順序排列，沒有任何結果時也會列出
    fn context_columns(&self) -> &[&'static str] {
        &[]
    }

    /// 寫入成功時結果列的 Status，例如 `deleted`
    fn success_label(&self) -> &'static str {
        "updated"
    }
}

/// 每個 ID 套用相同 method / payload，路徑中的 `{id}` 會被替換
#[derive(Debug, Clone)]
pub struct FixedPayload {
    method: Method,
    path_template: String,
    payload: Option<Value>,
    query: Vec<(String, String)>,
}

impl FixedPayload {
    pub fn new(method: Method, path_template: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            method,
            path_template: path_template.into(),
            payload,
            query: Vec::new(),
        }
    }

    pub fn put(path_template: impl Into<String>, payload: Value) -> Self {
        Self::new(Method::PUT, path_template, Some(payload))
    }

    pub fn delete(path_template: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path_template, None)
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn path_for(&self, id: u64) -> String {
        self.path_template.replace("{id}", &id.to_string())
    }

    pub fn request_for(&self, id: u64) -> ApiRequest {
        let mut request =
            ApiRequest::new(self.method.clone(), self.path_for(id)).with_query_pairs(&self.query);
        if let Some(payload) = &self.payload {
            request = request.with_body(payload.clone());
        }
        request
    }
}

#[async_trait]
impl MutationPlanner<u64> for FixedPayload {
    async fn plan(&self, _client: &HelpdeskClient, key: &u64) -> Result<MutationPlan> {
        Ok(MutationPlan::write(self.request_for(*key)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemStatus {
    Succeeded,
    Skipped { reason: String },
    Failed { error: String },
    NotAttempted,
}

impl ItemStatus {
    pub fn label<'a>(&self, success_label: &'a str) -> &'a str {
        match self {
            ItemStatus::Succeeded => success_label,
            ItemStatus::Skipped { .. } => "skipped",
            ItemStatus::Failed { .. } => "failed",
            ItemStatus::NotAttempted => "not attempted",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            ItemStatus::Skipped { reason } => reason,
            ItemStatus::Failed { error } => error,
            _ => "",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub key: String,
    pub status: ItemStatus,
    pub context: Record,
}

#[derive(Debug, Clone)]
pub struct BulkReport {
    pub outcomes: Vec<ItemOutcome>,
    pub stopped: bool,
    pub success_label: &'static str,
    pub context_columns: Vec<&'static str>,
}

impl Default for BulkReport {
    fn default() -> Self {
        Self {
            outcomes: Vec::new(),
            stopped: false,
            success_label: "updated",
            context_columns: Vec::new(),
        }
    }
}

impl BulkReport {
    fn count(&self, predicate: impl Fn(&ItemStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Succeeded))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Failed { .. }))
    }

    pub fn not_attempted(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::NotAttempted))
    }

    /// `key_label`、計畫宣告的欄位、其他出現過的附加欄位、Status、Detail
    pub fn columns(&self, key_label: &str) -> Vec<String> {
        let mut columns = vec![key_label.to_string()];
        columns.extend(self.context_columns.iter().map(|c| c.to_string()));
        for outcome in &self.outcomes {
            for key in outcome.context.data.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        columns.push("Status".to_string());
        columns.push("Detail".to_string());
        columns
    }

    /// 每筆一列，欄位見 [`BulkReport::columns`]
    pub fn to_records(&self, key_label: &str) -> Vec<Record> {
        self.outcomes
            .iter()
            .map(|outcome| {
                let mut record = Record::new().with(key_label, outcome.key.clone());
                for (key, value) in &outcome.context.data {
                    record.insert(key, value.clone());
                }
                record.insert("Status", outcome.status.label(self.success_label));
                record.insert("Detail", outcome.status.detail());
                record
            })
            .collect()
    }

    pub fn summary(&self) -> serde_json::Map<String, Value> {
        let mut summary = serde_json::Map::new();
        summary.insert("total".to_string(), self.outcomes.len().into());
        summary.insert("succeeded".to_string(), self.succeeded().into());
        summary.insert("skipped".to_string(), self.skipped().into());
        summary.insert("failed".to_string(), self.failed().into());
        summary.insert("not_attempted".to_string(), self.not_attempted().into());
        summary.insert("stopped".to_string(), self.stopped.into());
        summary
    }
}

pub struct BulkMutator {
    client: Arc<HelpdeskClient>,
    options: BulkOptions,
    stop: StopFlag,
}

impl BulkMutator {
    pub fn new(client: Arc<HelpdeskClient>, options: BulkOptions) -> Self {
        Self {
            client,
            options,
            stop: new_stop_flag(),
        }
    }

    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopFlag {
        self.stop.clone()
    }

    pub async fn run<K>(&self, keys: &[K], planner: &dyn MutationPlanner<K>) -> BulkReport
    where
        K: Display + Clone + Eq + Hash + Send + Sync,
    {
        let keys: Vec<K> = if self.options.dedupe_ids {
            let mut seen = HashSet::new();
            keys.iter().filter(|k| seen.insert((*k).clone())).cloned().collect()
        } else {
            keys.to_vec()
        };

        let total = keys.len();
        let mut report = BulkReport {
            success_label: planner.success_label(),
            context_columns: planner.context_columns().to_vec(),
            ..BulkReport::default()
        };
        tracing::info!("🚀 Starting bulk run over {} items", total);

        for (index, key) in keys.iter().enumerate() {
            if self.stop.load(Ordering::SeqCst) {
                tracing::warn!("🛑 Stop requested, {} items left unprocessed", total - index);
                report.stopped = true;
                report
                    .outcomes
                    .extend(keys[index..].iter().map(|k| ItemOutcome {
                        key: k.to_string(),
                        status: ItemStatus::NotAttempted,
                        context: Record::new(),
                    }));
                break;
            }

            tracing::info!("🔧 Processing {}/{}: {}", index + 1, total, key);

            let (status, context) = match planner.plan(&self.client, key).await {
                Ok(MutationPlan::Skip { reason, context }) => {
                    tracing::info!("⏭️ {}: {}", key, reason);
                    (ItemStatus::Skipped { reason }, context)
                }
                Ok(MutationPlan::Write { request, context }) => {
                    match self.client.send(&request).await {
                        Ok(_) => {
                            tracing::info!("✅ {}: {} {} succeeded", key, request.method, request.path);
                            (ItemStatus::Succeeded, context)
                        }
                        Err(e) => {
                            tracing::error!("❌ {}: {} {} failed: {}", key, request.method, request.path, e);
                            (ItemStatus::Failed { error: e.to_string() }, context)
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("❌ {}: could not prepare update: {}", key, e);
                    (ItemStatus::Failed { error: e.to_string() }, Record::new())
                }
            };

            report.outcomes.push(ItemOutcome {
                key: key.to_string(),
                status,
                context,
            });

            if index + 1 < total && !self.options.delay_between.is_zero() {
                tokio::time::sleep(self.options.delay_between).await;
            }
        }

        tracing::info!(
            "🏁 Bulk run finished. Succeeded: {}, Skipped: {}, Failed: {}, Not attempted: {}",
            report.succeeded(),
            report.skipped(),
            report.failed(),
            report.not_attempted()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fixed_payload_request() {
        let planner = FixedPayload::put("tickets/{id}", json!({"custom_fields": {"cf_internal": true}}));
        let request = planner.request_for(249811);
        assert_eq!(request.method, Method::PUT);
        assert_eq!(request.path, "tickets/249811");
        assert_eq!(request.body, Some(json!({"custom_fields": {"cf_internal": true}})));

        let delete = FixedPayload::delete("contacts/{id}/hard_delete").with_query("force", "true");
        let request = delete.request_for(5);
        assert_eq!(request.path, "contacts/5/hard_delete");
        assert_eq!(request.query, vec![("force".to_string(), "true".to_string())]);
        assert!(request.body.is_none());
    }

    #[test]
    fn test_report_counts_and_records() {
        let report = BulkReport {
            outcomes: vec![
                ItemOutcome {
                    key: "1".to_string(),
                    status: ItemStatus::Succeeded,
                    context: Record::new().with("Region", "West"),
                },
                ItemOutcome {
                    key: "2".to_string(),
                    status: ItemStatus::Skipped {
                        reason: "already tagged".to_string(),
                    },
                    context: Record::new(),
                },
                ItemOutcome {
                    key: "3".to_string(),
                    status: ItemStatus::Failed {
                        error: "HTTP 400".to_string(),
                    },
                    context: Record::new(),
                },
                ItemOutcome {
                    key: "4".to_string(),
                    status: ItemStatus::NotAttempted,
                    context: Record::new(),
                },
            ],
            stopped: true,
            success_label: "deleted",
            context_columns: vec!["Region"],
        };

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.not_attempted(), 1);

        let records = report.to_records("Ticket ID");
        assert_eq!(records.len(), 4);
        let first: Vec<&String> = records[0].data.keys().collect();
        assert_eq!(first, vec!["Ticket ID", "Region", "Status", "Detail"]);
        assert_eq!(records[0].get("Status"), Some(&json!("deleted")));
        assert_eq!(records[1].get("Detail"), Some(&json!("already tagged")));
        assert_eq!(records[3].get("Status"), Some(&json!("not attempted")));

        let summary = report.summary();
        assert_eq!(summary.get("total"), Some(&json!(4)));
        assert_eq!(summary.get("stopped"), Some(&json!(true)));
    }

    #[test]
    fn test_empty_report_still_has_columns() {
        let report = BulkReport {
            context_columns: vec!["Contact ID", "Name"],
            ..BulkReport::default()
        };
        assert_eq!(
            report.columns("Email"),
            vec!["Email", "Contact ID", "Name", "Status", "Detail"]
        );
        assert!(report.to_records("Email").is_empty());
    }

    #[test]
    fn test_plan_context() {
        let plan = MutationPlan::skip("dry run").with_context("Email", "a@b.com");
        match plan {
            MutationPlan::Skip { reason, context } => {
                assert_eq!(reason, "dry run");
                assert_eq!(context.get("Email"), Some(&json!("a@b.com")));
            }
            _ => panic!("expected skip"),
        }
    }
}
