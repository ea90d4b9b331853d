use super::{JobEnv, TargetSource};
use crate::client::{HelpdeskClient, PageOptions};
use crate::config::job_config::MergedTicketSettings;
use crate::core::export::Table;
use crate::core::sequence::JobContext;
use crate::domain::model::{Conversation, Record, Ticket};
use crate::domain::ports::{HelpdeskJob, JobOutput, Storage};
use crate::utils::error::{HelpdeskError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;

pub const MERGED_COLUMNS: [&str; 6] = [
    "Original Ticket ID",
    "Merged Ticket ID",
    "Created At",
    "Status",
    "Subject",
    "Tags",
];

/// 比對 `https://{domain}/a/tickets/{id}` 形式的工單連結
pub fn ticket_link_pattern(domain: &str) -> Result<Regex> {
    let pattern = format!(r"https://{}/a/tickets/(\d+)", regex::escape(domain));
    Regex::new(&pattern).map_err(|e| HelpdeskError::ConfigError {
        message: format!("Invalid portal domain '{}': {}", domain, e),
    })
}

/// 依第一次出現的順序回傳不重複的工單 ID
pub fn extract_ticket_ids<'a>(pattern: &Regex, bodies: impl IntoIterator<Item = &'a str>) -> Vec<u64> {
    let mut ids: Vec<u64> = Vec::new();
    for body in bodies {
        for caps in pattern.captures_iter(body) {
            if let Ok(id) = caps[1].parse::<u64>() {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
    }
    ids
}

fn merged_row(original: u64, merged: u64, ticket: &Ticket) -> Record {
    Record::new()
        .with("Original Ticket ID", original)
        .with("Merged Ticket ID", merged)
        .with("Created At", ticket.created_at.clone().unwrap_or_default())
        .with("Status", ticket.status().to_string())
        .with("Subject", ticket.subject.clone().unwrap_or_default())
        .with("Tags", ticket.tags.join(", "))
}

fn error_row(original: u64, merged: u64, error: &HelpdeskError) -> Record {
    let status = match error {
        HelpdeskError::NotFound { .. } => "Not found".to_string(),
        other => format!("Error: {}", other),
    };
    Record::new()
        .with("Original Ticket ID", original)
        .with("Merged Ticket ID", merged)
        .with("Created At", "")
        .with("Status", status)
        .with("Subject", "")
        .with("Tags", "")
}

/// 從對話內容找出被合併進來的工單
pub struct FindMergedJob<S: Storage> {
    name: String,
    targets: TargetSource,
    settings: MergedTicketSettings,
    env: Arc<JobEnv<S>>,
}

impl<S: Storage> FindMergedJob<S> {
    pub fn new(name: String, targets: TargetSource, settings: MergedTicketSettings, env: Arc<JobEnv<S>>) -> Self {
        Self {
            name,
            targets,
            settings,
            env,
        }
    }

    fn portal_domain(&self) -> Result<String> {
        self.settings
            .portal_domain
            .clone()
            .or_else(|| self.env.portal_domain.clone())
            .ok_or_else(|| HelpdeskError::MissingConfigError {
                field: "helpdesk.domain".to_string(),
            })
    }

    async fn referenced_ids(&self, client: &HelpdeskClient, pattern: &Regex, ticket_id: u64) -> Result<Vec<u64>> {
        let fetch = client
            .get_paginated(
                &format!("tickets/{}/conversations", ticket_id),
                &[],
                &PageOptions::default(),
            )
            .await;
        let conversations: Vec<Conversation> = fetch.decode()?;
        if let Some(e) = fetch.interruption {
            return Err(e);
        }

        let ids = extract_ticket_ids(
            pattern,
            conversations.iter().filter_map(|c| c.body.as_deref()),
        );
        Ok(ids.into_iter().filter(|id| *id != ticket_id).collect())
    }
}

#[async_trait]
impl<S: Storage + 'static> HelpdeskJob for FindMergedJob<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, context: &JobContext) -> Result<JobOutput> {
        let pattern = ticket_link_pattern(&self.portal_domain()?)?;
        let ids = self.targets.resolve_ids(context).await?;
        let client = &self.env.client;
        let total = ids.len();
        let mut records = Vec::new();
        let mut failures = 0usize;
        let mut stopped = false;

        for (index, ticket_id) in ids.iter().enumerate() {
            if context.is_stopped() {
                tracing::warn!("🛑 Stop requested, {} tickets left unscanned", total - index);
                stopped = true;
                break;
            }

            tracing::info!("🔍 Scanning {}/{}: ticket {}", index + 1, total, ticket_id);
            let referenced = match self.referenced_ids(client, &pattern, *ticket_id).await {
                Ok(ids) => ids,
                Err(e) => {
                    tracing::error!("❌ Conversations for ticket {} failed: {}", ticket_id, e);
                    failures += 1;
                    continue;
                }
            };
            tracing::info!(
                "🔗 Ticket {}: {} merged ticket references",
                ticket_id,
                referenced.len()
            );

            for merged_id in referenced {
                let row = match client
                    .get_as::<Ticket>(&format!("tickets/{}", merged_id), &[])
                    .await
                {
                    Ok(ticket) => merged_row(*ticket_id, merged_id, &ticket),
                    Err(e) => {
                        tracing::warn!("⚠️ Merged ticket {} could not be fetched: {}", merged_id, e);
                        error_row(*ticket_id, merged_id, &e)
                    }
                };
                records.push(row);
            }
        }

        let columns = MERGED_COLUMNS.iter().map(|c| c.to_string()).collect();
        let table = Table::with_columns(columns, &records);
        let mut output = self.env.export_table(&self.name, &table, records).await?;
        output
            .metadata
            .insert("tickets_scanned".to_string(), total.into());
        output
            .metadata
            .insert("scan_failures".to_string(), failures.into());
        output.metadata.insert("stopped".to_string(), stopped.into());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_ticket_ids_dedupes_in_order() {
        let pattern = ticket_link_pattern("acme.freshdesk.com").unwrap();
        let bodies = [
            r#"Merged into <a href="https://acme.freshdesk.com/a/tickets/120">#120</a>"#,
            "See https://acme.freshdesk.com/a/tickets/99 and https://acme.freshdesk.com/a/tickets/120",
            "Other tenant https://evil.freshdesk.com/a/tickets/5",
        ];
        assert_eq!(extract_ticket_ids(&pattern, bodies), vec![120, 99]);
    }

    #[test]
    fn test_domain_is_escaped() {
        let pattern = ticket_link_pattern("acme.freshdesk.com").unwrap();
        assert!(extract_ticket_ids(&pattern, ["https://acmeXfreshdesk.com/a/tickets/1"]).is_empty());
    }

    #[test]
    fn test_rows() {
        let ticket: Ticket = serde_json::from_value(serde_json::json!({
            "id": 120,
            "status": 5,
            "subject": "Printer",
            "tags": ["hw", "merged"],
            "created_at": "2024-05-01T08:00:00Z"
        }))
        .unwrap();

        let row = merged_row(7, 120, &ticket);
        let keys: Vec<&str> = row.data.keys().map(String::as_str).collect();
        assert_eq!(keys, MERGED_COLUMNS.to_vec());
        assert_eq!(row.get("Status"), Some(&serde_json::json!("Closed")));
        assert_eq!(row.get("Tags"), Some(&serde_json::json!("hw, merged")));

        let missing = error_row(7, 121, &HelpdeskError::NotFound { url: "x".to_string() });
        assert_eq!(missing.get("Status"), Some(&serde_json::json!("Not found")));
    }
}
