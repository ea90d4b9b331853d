use super::{JobEnv, TargetSource};
use crate::client::HelpdeskClient;
use crate::config::job_config::UpdateFieldsSettings;
use crate::core::bulk::{FixedPayload, MutationPlan, MutationPlanner};
use crate::core::sequence::JobContext;
use crate::domain::ports::{HelpdeskJob, JobOutput, Storage};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// 巢狀物件逐欄比對；其他型別需完全相等
pub fn payload_satisfied(current: &Value, desired: &Value) -> bool {
    match (current, desired) {
        (Value::Object(current), Value::Object(desired)) => desired.iter().all(|(key, want)| {
            current
                .get(key)
                .is_some_and(|have| payload_satisfied(have, want))
        }),
        (current, desired) => current == desired,
    }
}

/// 先讀取現有資料，已符合就略過
pub struct SkipIfMatching {
    inner: FixedPayload,
}

impl SkipIfMatching {
    pub fn new(inner: FixedPayload) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl MutationPlanner<u64> for SkipIfMatching {
    async fn plan(&self, client: &HelpdeskClient, id: &u64) -> Result<MutationPlan> {
        let request = self.inner.request_for(*id);
        let current = client.get_json(&request.path, &[]).await?;

        match &request.body {
            Some(desired) if payload_satisfied(&current, desired) => {
                Ok(MutationPlan::skip("fields already match"))
            }
            _ => Ok(MutationPlan::write(request)),
        }
    }
}

pub struct UpdateFieldsJob<S: Storage> {
    name: String,
    targets: TargetSource,
    settings: UpdateFieldsSettings,
    dedupe: bool,
    env: Arc<JobEnv<S>>,
}

impl<S: Storage> UpdateFieldsJob<S> {
    pub fn new(
        name: String,
        targets: TargetSource,
        settings: UpdateFieldsSettings,
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
impl<S: Storage + 'static> HelpdeskJob for UpdateFieldsJob<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, context: &JobContext) -> Result<JobOutput> {
        let ids = self.targets.resolve_ids(context).await?;
        tracing::info!(
            "✏️ Updating {} records via {} with {}",
            ids.len(),
            self.settings.path,
            self.settings.payload
        );

        let fixed = FixedPayload::put(self.settings.path.clone(), self.settings.payload.clone());
        let base_name = format!("{}_results", self.name);

        if self.settings.skip_if_matching {
            let planner = SkipIfMatching::new(fixed);
            self.env
                .run_bulk(context, &base_name, "ID", &ids, &planner, self.dedupe)
                .await
        } else {
            self.env
                .run_bulk(context, &base_name, "ID", &ids, &fixed, self.dedupe)
                .await
        }
    }
}
