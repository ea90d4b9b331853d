use super::JobEnv;
use crate::client::{PageOptions, PaginatedFetch};
use crate::config::job_config::{ListExportSettings, TicketExportSettings};
use crate::core::export::{flatten_record, Table};
use crate::core::sequence::JobContext;
use crate::domain::model::{Agent, Record, Ticket};
use crate::domain::ports::{HelpdeskJob, JobOutput, Storage};
use crate::utils::error::{HelpdeskError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use std::sync::Arc;

pub const AGENT_COLUMNS: [&str; 11] = [
    "Agent ID",
    "Name",
    "Email",
    "Phone",
    "Mobile",
    "Active",
    "Role",
    "Available",
    "Created At",
    "Updated At",
    "Last Login At",
];

/// API 沒有回傳任何資料時使用的欄位
pub const TICKET_COLUMNS: [&str; 13] = [
    "id",
    "subject",
    "status",
    "priority",
    "requester_id",
    "responder_id",
    "group_id",
    "company_id",
    "tags",
    "created_at",
    "updated_at",
    "status_name",
    "priority_name",
];

pub const CONTACT_COLUMNS: [&str; 9] = [
    "id",
    "name",
    "email",
    "phone",
    "mobile",
    "company_id",
    "active",
    "created_at",
    "updated_at",
];

pub const COMPANY_COLUMNS: [&str; 6] = ["id", "name", "description", "domains", "created_at", "updated_at"];

/// 寫出已取得的資料；分頁中斷時檔案仍會寫出，但作業回報失敗
async fn export_fetch<S: Storage>(
    env: &JobEnv<S>,
    job_name: &str,
    base_name: &str,
    fetch: PaginatedFetch,
    records: Vec<Record>,
    table: Table,
) -> Result<JobOutput> {
    let mut output = env.export_table(base_name, &table, records).await?;
    output
        .metadata
        .insert("pages_fetched".to_string(), fetch.pages_fetched.into());

    match fetch.interruption {
        None => Ok(output),
        Some(e) => {
            tracing::warn!(
                "⚠️ {}: export is partial ({} rows written to {:?})",
                job_name,
                table.len(),
                output.output_files
            );
            Err(HelpdeskError::JobError {
                job: job_name.to_string(),
                details: format!(
                    "Fetch interrupted after {} rows (partial files written): {}",
                    table.len(),
                    e
                ),
            })
        }
    }
}

/// `updated_since` 優先，否則以 `days_back` 回推
pub fn updated_since(settings: &TicketExportSettings, now: DateTime<Utc>) -> Option<String> {
    if let Some(since) = &settings.updated_since {
        return Some(since.clone());
    }
    settings.days_back.map(|days| {
        (now - ChronoDuration::days(i64::from(days)))
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string()
    })
}

/// 攤平後補上狀態與優先等級名稱
pub fn ticket_record(raw: &Value) -> Record {
    let mut record = flatten_record(raw);
    let ticket: Ticket = serde_json::from_value(raw.clone()).unwrap_or_default();
    record.insert("status_name", ticket.status().to_string());
    record.insert("priority_name", ticket.priority().to_string());
    record
}

pub struct TicketExportJob<S: Storage> {
    name: String,
    base_name: String,
    settings: TicketExportSettings,
    env: Arc<JobEnv<S>>,
}

impl<S: Storage> TicketExportJob<S> {
    pub fn new(name: String, base_name: String, settings: TicketExportSettings, env: Arc<JobEnv<S>>) -> Self {
        Self {
            name,
            base_name,
            settings,
            env,
        }
    }

    fn query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(since) = updated_since(&self.settings, Utc::now()) {
            query.push(("updated_since".to_string(), since));
        }
        if let Some(include) = &self.settings.include {
            query.push(("include".to_string(), include.clone()));
        }
        query
    }
}

#[async_trait]
impl<S: Storage + 'static> HelpdeskJob for TicketExportJob<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _context: &JobContext) -> Result<JobOutput> {
        let options = PageOptions::default().with_max_pages(self.settings.max_pages);
        let fetch = self
            .env
            .client
            .get_paginated("tickets", &self.query(), &options)
            .await;

        let records: Vec<Record> = fetch.items.iter().map(ticket_record).collect();
        let table = Table::from_records_or(&records, &TICKET_COLUMNS);
        export_fetch(&self.env, &self.name, &self.base_name, fetch, records, table).await
    }
}

/// 聯絡人、公司等清單端點：逐頁抓取後攤平
pub struct ListExportJob<S: Storage> {
    name: String,
    resource: &'static str,
    base_name: String,
    settings: ListExportSettings,
    env: Arc<JobEnv<S>>,
}

impl<S: Storage> ListExportJob<S> {
    pub fn new(
        name: String,
        resource: &'static str,
        base_name: String,
        settings: ListExportSettings,
        env: Arc<JobEnv<S>>,
    ) -> Self {
        Self {
            name,
            resource,
            base_name,
            settings,
            env,
        }
    }

    fn base_columns(&self) -> &'static [&'static str] {
        match self.resource {
            "contacts" => &CONTACT_COLUMNS,
            "companies" => &COMPANY_COLUMNS,
            _ => &["id"],
        }
    }
}

#[async_trait]
impl<S: Storage + 'static> HelpdeskJob for ListExportJob<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _context: &JobContext) -> Result<JobOutput> {
        let mut query: Vec<(String, String)> = self
            .settings
            .query
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        query.sort();

        let options = PageOptions::default().with_max_pages(self.settings.max_pages);
        let fetch = self.env.client.get_paginated(self.resource, &query, &options).await;

        let records: Vec<Record> = fetch.items.iter().map(flatten_record).collect();
        let table = Table::from_records_or(&records, self.base_columns());
        export_fetch(&self.env, &self.name, &self.base_name, fetch, records, table).await
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

fn or_na(value: &Option<String>) -> Value {
    Value::String(value.clone().unwrap_or_else(|| "N/A".to_string()))
}

pub fn agent_record(agent: &Agent) -> Record {
    Record::new()
        .with("Agent ID", agent.id)
        .with(
            "Name",
            agent.contact.name.clone().unwrap_or_else(|| "Unknown Agent".to_string()),
        )
        .with("Email", or_na(&agent.contact.email))
        .with("Phone", or_na(&agent.contact.phone))
        .with("Mobile", or_na(&agent.contact.mobile))
        .with("Active", yes_no(agent.active.unwrap_or(false)))
        .with(
            "Role",
            if agent.administrator.unwrap_or(false) {
                "Admin"
            } else {
                "Agent"
            },
        )
        .with("Available", agent.available.map(yes_no).unwrap_or("N/A"))
        .with("Created At", or_na(&agent.created_at))
        .with("Updated At", or_na(&agent.updated_at))
        .with("Last Login At", or_na(&agent.contact.last_login_at))
}

pub struct AgentExportJob<S: Storage> {
    name: String,
    base_name: String,
    settings: ListExportSettings,
    env: Arc<JobEnv<S>>,
}

impl<S: Storage> AgentExportJob<S> {
    pub fn new(name: String, base_name: String, settings: ListExportSettings, env: Arc<JobEnv<S>>) -> Self {
        Self {
            name,
            base_name,
            settings,
            env,
        }
    }
}

#[async_trait]
impl<S: Storage + 'static> HelpdeskJob for AgentExportJob<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _context: &JobContext) -> Result<JobOutput> {
        let options = PageOptions::default().with_max_pages(self.settings.max_pages);
        let fetch = self.env.client.get_paginated("agents", &[], &options).await;

        let agents: Vec<Agent> = fetch.decode()?;
        let records: Vec<Record> = agents.iter().map(agent_record).collect();
        let columns = AGENT_COLUMNS.iter().map(|c| c.to_string()).collect();
        let table = Table::with_columns(columns, &records);

        tracing::info!("👥 {} agents normalized", records.len());
        export_fetch(&self.env, &self.name, &self.base_name, fetch, records, table).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_updated_since_from_days_back() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let settings = TicketExportSettings {
            days_back: Some(7),
            ..TicketExportSettings::default()
        };
        assert_eq!(
            updated_since(&settings, now).as_deref(),
            Some("2024-03-03T12:00:00Z")
        );

        let explicit = TicketExportSettings {
            days_back: Some(7),
            updated_since: Some("2024-01-01T00:00:00Z".to_string()),
            ..TicketExportSettings::default()
        };
        assert_eq!(
            updated_since(&explicit, now).as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
        assert!(updated_since(&TicketExportSettings::default(), now).is_none());
    }

    #[test]
    fn test_ticket_record_adds_names() {
        let record = ticket_record(&json!({
            "id": 5,
            "status": 4,
            "priority": 1,
            "custom_fields": {"cf_region": "West"}
        }));
        assert_eq!(record.get("status_name"), Some(&json!("Resolved")));
        assert_eq!(record.get("priority_name"), Some(&json!("Low")));
        assert_eq!(record.get("custom_fields.cf_region"), Some(&json!("West")));
    }

    #[test]
    fn test_agent_record_normalization() {
        let agent: Agent = serde_json::from_value(json!({
            "id": 77,
            "available": true,
            "active": true,
            "administrator": false,
            "contact": {"name": "Dana", "email": "dana@x.com", "last_login_at": "2024-02-01T10:00:00Z"},
            "created_at": "2023-01-01T00:00:00Z"
        }))
        .unwrap();

        let record = agent_record(&agent);
        let keys: Vec<&str> = record.data.keys().map(String::as_str).collect();
        assert_eq!(keys, AGENT_COLUMNS.to_vec());
        assert_eq!(record.get("Role"), Some(&json!("Agent")));
        assert_eq!(record.get("Available"), Some(&json!("Yes")));
        assert_eq!(record.get("Phone"), Some(&json!("N/A")));
        assert_eq!(record.get("Last Login At"), Some(&json!("2024-02-01T10:00:00Z")));

        let unknown: Agent = serde_json::from_value(json!({"id": 1})).unwrap();
        let record = agent_record(&unknown);
        assert_eq!(record.get("Name"), Some(&json!("Unknown Agent")));
        assert_eq!(record.get("Available"), Some(&json!("N/A")));
        assert_eq!(record.get("Active"), Some(&json!("No")));
    }
}
