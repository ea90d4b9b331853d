use super::{JobEnv, TargetSource};
use crate::client::{ApiRequest, HelpdeskClient};
use crate::config::job_config::AddTagsSettings;
use crate::core::bulk::{MutationPlan, MutationPlanner};
use crate::core::sequence::JobContext;
use crate::domain::model::Ticket;
use crate::domain::ports::{HelpdeskJob, JobOutput, Storage};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// 既有標籤順序不變，新標籤依序附加且不重複；全部已存在時回傳 `None`
pub fn merge_tags(existing: &[String], wanted: &[String]) -> Option<Vec<String>> {
    let mut merged = existing.to_vec();
    for tag in wanted.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !merged.iter().any(|t| t == tag) {
            merged.push(tag.to_string());
        }
    }

    if merged.len() == existing.len() {
        None
    } else {
        Some(merged)
    }
}

pub struct TagPlanner {
    tags: Vec<String>,
}

impl TagPlanner {
    pub fn new(tags: Vec<String>) -> Self {
        Self { tags }
    }
}

#[async_trait]
impl MutationPlanner<u64> for TagPlanner {
    async fn plan(&self, client: &HelpdeskClient, ticket_id: &u64) -> Result<MutationPlan> {
        let path = format!("tickets/{}", ticket_id);
        let ticket: Ticket = client.get_as(&path, &[]).await?;

        Ok(match merge_tags(&ticket.tags, &self.tags) {
            None => MutationPlan::skip("all tags already present"),
            Some(tags) => {
                let added = tags.len() - ticket.tags.len();
                MutationPlan::write(ApiRequest::put(path, json!({ "tags": tags })))
                    .with_context("Tags Added", added)
            }
        })
    }

    fn context_columns(&self) -> &[&'static str] {
        &["Tags Added"]
    }

    fn success_label(&self) -> &'static str {
        "tagged"
    }
}

pub struct AddTagsJob<S: Storage> {
    name: String,
    targets: TargetSource,
    settings: AddTagsSettings,
    dedupe: bool,
    env: Arc<JobEnv<S>>,
}

impl<S: Storage> AddTagsJob<S> {
    pub fn new(
        name: String,
        targets: TargetSource,
        settings: AddTagsSettings,
        dedupe: bool,
        env: Arc<JobEnv<S>>,
    ) -> Self {
        Self {
            name,
            targets,
            settings,
            dedupe,
            env,
        }
    }
}

#[async_trait]
impl<S: Storage + 'static> HelpdeskJob for AddTagsJob<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, context: &JobContext) -> Result<JobOutput> {
        let ids = self.targets.resolve_ids(context).await?;
        tracing::info!("🏷️ Adding {:?} to {} tickets", self.settings.tags, ids.len());

        let planner = TagPlanner::new(self.settings.tags.clone());
        let base_name = format!("{}_results", self.name);
        self.env
            .run_bulk(context, &base_name, "Ticket ID", &ids, &planner, self.dedupe)
            .await
    }
}
