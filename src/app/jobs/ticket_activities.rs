use super::{JobEnv, TargetSource};
use crate::config::job_config::TicketActivitySettings;
use crate::core::export::Table;
use crate::core::sequence::JobContext;
use crate::domain::model::{Record, TicketActivity};
use crate::domain::ports::{HelpdeskJob, JobOutput, Storage};
use crate::utils::error::{HelpdeskError, Result};
use crate::utils::text::clean_html;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::sync::Arc;

pub const ACTIVITY_COLUMNS: [&str; 6] = [
    "Ticket ID",
    "Activity ID",
    "Created At",
    "Activity Type",
    "Performer ID",
    "Description",
];

/// 活動的時間區間與類型篩選
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    since: Option<DateTime<FixedOffset>>,
    until: Option<DateTime<FixedOffset>>,
    types: Vec<String>,
}

impl ActivityFilter {
    pub fn from_settings(settings: &TicketActivitySettings) -> Result<Self> {
        let parse = |field: &str, value: &Option<String>| -> Result<Option<DateTime<FixedOffset>>> {
            value
                .as_deref()
                .map(|raw| {
                    DateTime::parse_from_rfc3339(raw.trim()).map_err(|e| HelpdeskError::InvalidConfigValueError {
                        field: field.to_string(),
                        value: raw.to_string(),
                        reason: e.to_string(),
                    })
                })
                .transpose()
        };

        Ok(Self {
            since: parse("since", &settings.since)?,
            until: parse("until", &settings.until)?,
            types: settings
                .activity_types
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        })
    }

    pub fn matches(&self, activity: &TicketActivity) -> bool {
        if !self.types.is_empty() {
            let kind = activity.activity_type.as_deref().unwrap_or_default().to_lowercase();
            if !self.types.contains(&kind) {
                return false;
            }
        }

        if self.since.is_none() && self.until.is_none() {
            return true;
        }
        // 有時間區間時，沒有可解析時間的活動一律排除
        let Some(created) = activity
            .created_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        else {
            return false;
        };
        self.since.map_or(true, |since| created >= since) && self.until.map_or(true, |until| created <= until)
    }
}

/// 回應可能是陣列，也可能包在 `activities` 欄位內
pub fn activity_items(body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => match obj.remove("activities") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(HelpdeskError::ProcessingError {
                message: "Expected an 'activities' array in the response".to_string(),
            }),
        },
        Value::Null => Ok(Vec::new()),
        _ => Err(HelpdeskError::ProcessingError {
            message: "Expected a JSON array of activities".to_string(),
        }),
    }
}

pub fn activity_record(ticket_id: u64, activity: &TicketActivity) -> Record {
    Record::new()
        .with("Ticket ID", activity.ticket_id.unwrap_or(ticket_id))
        .with("Activity ID", activity.id)
        .with("Created At", activity.created_at.clone().unwrap_or_default())
        .with("Activity Type", activity.activity_type.clone().unwrap_or_default())
        .with(
            "Performer ID",
            activity.performer_id.map(Value::from).unwrap_or(Value::Null),
        )
        .with(
            "Description",
            clean_html(activity.description.as_deref().unwrap_or_default()),
        )
}

/// 逐張工單讀取活動紀錄；單張失敗只記錄，不中止作業
pub struct TicketActivityExportJob<S: Storage> {
    name: String,
    base_name: String,
    targets: TargetSource,
    settings: TicketActivitySettings,
    env: Arc<JobEnv<S>>,
}

impl<S: Storage> TicketActivityExportJob<S> {
    pub fn new(
        name: String,
        base_name: String,
        targets: TargetSource,
        settings: TicketActivitySettings,
        env: Arc<JobEnv<S>>,
    ) -> Self {
        Self {
            name,
            base_name,
            targets,
            settings,
            env,
        }
    }

    async fn activities(&self, ticket_id: u64) -> Result<Vec<TicketActivity>> {
        let body = self
            .env
            .client
            .get_json(&format!("tickets/{}/activities", ticket_id), &[])
            .await?;
        activity_items(body)?
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(HelpdeskError::from))
            .collect()
    }
}

#[async_trait]
impl<S: Storage + 'static> HelpdeskJob for TicketActivityExportJob<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, context: &JobContext) -> Result<JobOutput> {
        let filter = ActivityFilter::from_settings(&self.settings)?;
        let ids = self.targets.resolve_ids(context).await?;
        let total = ids.len();
        let mut records = Vec::new();
        let mut failures = 0usize;
        let mut stopped = false;

        for (index, ticket_id) in ids.iter().enumerate() {
            if context.is_stopped() {
                tracing::warn!("🛑 Stop requested, {} tickets left unread", total - index);
                stopped = true;
                break;
            }

            tracing::info!("🗂️ Reading activities {}/{}: ticket {}", index + 1, total, ticket_id);
            match self.activities(*ticket_id).await {
                Ok(activities) => {
                    let before = records.len();
                    records.extend(
                        activities
                            .iter()
                            .filter(|activity| filter.matches(activity))
                            .map(|activity| activity_record(*ticket_id, activity)),
                    );
                    tracing::info!(
                        "📝 Ticket {}: {} of {} activities kept",
                        ticket_id,
                        records.len() - before,
                        activities.len()
                    );
                }
                Err(e) => {
                    tracing::error!("❌ Activities for ticket {} failed: {}", ticket_id, e);
                    failures += 1;
                }
            }
        }

        let columns = ACTIVITY_COLUMNS.iter().map(|c| c.to_string()).collect();
        let table = Table::with_columns(columns, &records);
        let mut output = self.env.export_table(&self.base_name, &table, records).await?;
        output.metadata.insert("tickets_read".to_string(), total.into());
        output.metadata.insert("fetch_failures".to_string(), failures.into());
        output.metadata.insert("stopped".to_string(), stopped.into());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn activity(value: Value) -> TicketActivity {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_window_is_inclusive() {
        let filter = ActivityFilter::from_settings(&TicketActivitySettings {
            since: Some("2024-05-01T00:00:00Z".to_string()),
            until: Some("2024-05-01T23:59:59Z".to_string()),
            ..TicketActivitySettings::default()
        })
        .unwrap();

        assert!(filter.matches(&activity(json!({"id": 1, "created_at": "2024-05-01T00:00:00Z"}))));
        assert!(filter.matches(&activity(json!({"id": 2, "created_at": "2024-05-01T23:59:59Z"}))));
        assert!(!filter.matches(&activity(json!({"id": 3, "created_at": "2024-05-02T00:00:00Z"}))));
        assert!(!filter.matches(&activity(json!({"id": 4}))));
    }

    #[test]
    fn test_type_filter_ignores_case() {
        let filter = ActivityFilter::from_settings(&TicketActivitySettings {
            activity_types: vec!["Note".to_string()],
            ..TicketActivitySettings::default()
        })
        .unwrap();

        assert!(filter.matches(&activity(json!({"id": 1, "activity_type": "note"}))));
        assert!(!filter.matches(&activity(json!({"id": 2, "activity_type": "status_change"}))));
        assert!(ActivityFilter::default().matches(&activity(json!({"id": 3}))));
    }

    #[test]
    fn test_activity_items_shapes() {
        assert_eq!(activity_items(json!([{"id": 1}])).unwrap().len(), 1);
        assert_eq!(
            activity_items(json!({"activities": [{"id": 1}, {"id": 2}]})).unwrap().len(),
            2
        );
        assert!(activity_items(Value::Null).unwrap().is_empty());
        assert!(activity_items(json!({"id": 1})).is_err());
    }

    #[test]
    fn test_activity_record() {
        let record = activity_record(
            9,
            &activity(json!({
                "id": 55,
                "activity_type": "note",
                "description": "<p>Called the <b>customer</b></p>",
                "created_at": "2024-05-01T10:00:00Z"
            })),
        );
        let keys: Vec<&str> = record.data.keys().map(String::as_str).collect();
        assert_eq!(keys, ACTIVITY_COLUMNS.to_vec());
        assert_eq!(record.get("Ticket ID"), Some(&json!(9)));
        assert_eq!(record.get("Description"), Some(&json!("Called the customer")));
        assert_eq!(record.get("Performer ID"), Some(&Value::Null));
    }
}
