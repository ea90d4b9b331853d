use super::{JobEnv, TargetSource};
use crate::client::{ApiRequest, HelpdeskClient};
use crate::config::job_config::DeleteContactsSettings;
use crate::core::bulk::{MutationPlan, MutationPlanner};
use crate::core::sequence::JobContext;
use crate::domain::model::Contact;
use crate::domain::ports::{HelpdeskJob, JobOutput, Storage};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// 依 email 找聯絡人並刪除；未確認時只回報
pub struct ContactDeletionPlanner {
    confirm: bool,
    permanent: bool,
}

impl ContactDeletionPlanner {
    pub fn new(confirm: bool, permanent: bool) -> Self {
        Self { confirm, permanent }
    }

    pub fn delete_request(&self, contact_id: u64) -> ApiRequest {
        if self.permanent {
            ApiRequest::delete(format!("contacts/{}/hard_delete", contact_id)).with_query("force", "true")
        } else {
            ApiRequest::delete(format!("contacts/{}", contact_id))
        }
    }
}

#[async_trait]
impl MutationPlanner<String> for ContactDeletionPlanner {
    async fn plan(&self, client: &HelpdeskClient, email: &String) -> Result<MutationPlan> {
        let query = [("email".to_string(), email.trim().to_string())];
        let matches: Vec<Contact> = client.get_as("contacts", &query).await?;

        let Some(contact) = matches.first() else {
            return Ok(MutationPlan::skip("no contact found")
                .with_context("Contact ID", "")
                .with_context("Name", ""));
        };

        if matches.len() > 1 {
            tracing::warn!(
                "⚠️ {} contacts match {}, only {} is handled",
                matches.len(),
                email,
                contact.id
            );
        }

        let name = contact.name.clone().unwrap_or_default();
        let plan = if self.confirm {
            MutationPlan::write(self.delete_request(contact.id))
        } else {
            MutationPlan::skip("dry run: set confirm = true to delete")
        };

        Ok(plan
            .with_context("Contact ID", contact.id)
            .with_context("Name", name))
    }

    fn context_columns(&self) -> &[&'static str] {
        &["Contact ID", "Name"]
    }

    fn success_label(&self) -> &'static str {
        "deleted"
    }
}

pub struct DeleteContactsJob<S: Storage> {
    name: String,
    targets: TargetSource,
    settings: DeleteContactsSettings,
    dedupe: bool,
    env: Arc<JobEnv<S>>,
}

impl<S: Storage> DeleteContactsJob<S> {
    pub fn new(
        name: String,
        targets: TargetSource,
        settings: DeleteContactsSettings,
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
impl<S: Storage + 'static> HelpdeskJob for DeleteContactsJob<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, context: &JobContext) -> Result<JobOutput> {
        let emails: Vec<String> = self
            .targets
            .resolve(context)
            .await?
            .into_iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();

        if self.settings.confirm {
            tracing::warn!(
                "🗑️ Deleting contacts for {} emails ({})",
                emails.len(),
                if self.settings.permanent { "permanent" } else { "soft" }
            );
        } else {
            tracing::info!("🔍 Dry run: looking up {} emails, nothing will be deleted", emails.len());
        }

        let planner = ContactDeletionPlanner::new(self.settings.confirm, self.settings.permanent);
        let base_name = format!("{}_results", self.name);
        self.env
            .run_bulk(context, &base_name, "Email", &emails, &planner, self.dedupe)
            .await
    }
}
