use super::JobEnv;
use crate::config::job_config::SlaExportSettings;
use crate::core::export::Table;
use crate::core::sequence::JobContext;
use crate::domain::model::{Record, SlaPolicy};
use crate::domain::ports::{HelpdeskJob, JobOutput, Storage};
use crate::utils::error::{HelpdeskError, Result};
use crate::utils::text::format_duration_secs;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub const SLA_COLUMNS: [&str; 10] = [
    "Policy ID",
    "Policy Name",
    "Description",
    "Default",
    "Active",
    "Priority",
    "Respond Within",
    "Resolve Within",
    "Business Hours",
    "Escalation Enabled",
];

fn humanize(seconds: Option<u64>) -> String {
    seconds
        .map(format_duration_secs)
        .unwrap_or_else(|| "N/A".to_string())
}

fn flag(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "Yes",
        Some(false) => "No",
        None => "Not configured",
    }
}

/// 每個政策的每個優先等級一列
pub fn policy_rows(policy: &SlaPolicy) -> Vec<Record> {
    let base = Record::new()
        .with("Policy ID", policy.id)
        .with("Policy Name", policy.name.clone())
        .with("Description", policy.description.clone().unwrap_or_default())
        .with("Default", if policy.is_default { "Yes" } else { "No" })
        .with("Active", flag(policy.active));

    let targets = policy.targets();
    if targets.is_empty() {
        let mut record = base;
        record.insert("Priority", "");
        record.insert("Respond Within", "N/A");
        record.insert("Resolve Within", "N/A");
        record.insert("Business Hours", "Not configured");
        record.insert("Escalation Enabled", "Not configured");
        return vec![record];
    }

    targets
        .into_iter()
        .map(|(priority, target)| {
            let mut record = base.clone();
            record.insert("Priority", priority.to_uppercase());
            record.insert("Respond Within", humanize(target.respond_within));
            record.insert("Resolve Within", humanize(target.resolve_within));
            record.insert("Business Hours", flag(target.business_hours));
            record.insert("Escalation Enabled", flag(target.escalation_enabled));
            record
        })
        .collect()
}

pub fn matches_filter(policy_name: &str, filter: Option<&str>) -> bool {
    match filter {
        Some(filter) => policy_name
            .to_lowercase()
            .contains(&filter.trim().to_lowercase()),
        None => true,
    }
}

/// 匯出 SLA 政策：原始 JSON 備份與攤平後的目標表格
pub struct SlaPolicyExportJob<S: Storage> {
    name: String,
    base_name: String,
    settings: SlaExportSettings,
    env: Arc<JobEnv<S>>,
}

impl<S: Storage> SlaPolicyExportJob<S> {
    pub fn new(name: String, base_name: String, settings: SlaExportSettings, env: Arc<JobEnv<S>>) -> Self {
        Self {
            name,
            base_name,
            settings,
            env,
        }
    }
}

#[async_trait]
impl<S: Storage + 'static> HelpdeskJob for SlaPolicyExportJob<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _context: &JobContext) -> Result<JobOutput> {
        let raw = self.env.client.get_json("sla_policies", &[]).await?;
        let Value::Array(items) = raw else {
            return Err(HelpdeskError::ProcessingError {
                message: "Expected a JSON array of SLA policies".to_string(),
            });
        };

        let filter = self.settings.name_filter.as_deref();
        let selected: Vec<Value> = items
            .into_iter()
            .filter(|item| {
                let name = item.get("name").and_then(Value::as_str).unwrap_or_default();
                matches_filter(name, filter)
            })
            .collect();
        tracing::info!("📋 {} SLA policies selected", selected.len());

        let policies: Vec<SlaPolicy> = selected
            .iter()
            .map(|item| serde_json::from_value(item.clone()))
            .collect::<std::result::Result<_, _>>()?;

        let records: Vec<Record> = policies.iter().flat_map(policy_rows).collect();
        let columns = SLA_COLUMNS.iter().map(|c| c.to_string()).collect();
        let table = Table::with_columns(columns, &records);

        let backup_name = format!("{}_raw", self.base_name);
        let backup = self
            .env
            .exporter()
            .write_raw_json(&backup_name, &Value::Array(selected))
            .await?;

        let mut output = self.env.export_table(&self.base_name, &table, records).await?;
        output.output_files.push(backup);
        output
            .metadata
            .insert("policies".to_string(), policies.len().into());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn policy() -> SlaPolicy {
        serde_json::from_value(json!({
            "id": 3,
            "name": "Default Service Request SLA",
            "is_default": true,
            "active": true,
            "sla_target": {
                "priority_4": {"respond_within": 1800, "resolve_within": 9000, "business_hours": false, "escalation_enabled": true},
                "priority_1": {"respond_within": 45, "resolve_within": 86400, "business_hours": true}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_policy_rows_per_priority() {
        let rows = policy_rows(&policy());
        assert_eq!(rows.len(), 2);
        let keys: Vec<&str> = rows[0].data.keys().map(String::as_str).collect();
        assert_eq!(keys, SLA_COLUMNS.to_vec());

        assert_eq!(rows[0].get("Priority"), Some(&json!("PRIORITY_4")));
        assert_eq!(rows[0].get("Respond Within"), Some(&json!("30m")));
        assert_eq!(rows[0].get("Resolve Within"), Some(&json!("2h 30m")));
        assert_eq!(rows[0].get("Escalation Enabled"), Some(&json!("Yes")));

        assert_eq!(rows[1].get("Respond Within"), Some(&json!("45s")));
        assert_eq!(rows[1].get("Resolve Within"), Some(&json!("24h")));
        assert_eq!(rows[1].get("Escalation Enabled"), Some(&json!("Not configured")));
        assert_eq!(rows[1].get("Default"), Some(&json!("Yes")));
    }

    #[test]
    fn test_policy_without_targets_still_listed() {
        let policy: SlaPolicy = serde_json::from_value(json!({"id": 9, "name": "Empty"})).unwrap();
        let rows = policy_rows(&policy);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Respond Within"), Some(&json!("N/A")));
    }

    #[test]
    fn test_name_filter() {
        assert!(matches_filter("Default Service Request SLA", Some("service request")));
        assert!(!matches_filter("VIP SLA", Some("service")));
        assert!(matches_filter("anything", None));
    }
}
