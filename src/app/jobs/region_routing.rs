use super::{JobEnv, TargetSource};
use crate::client::{ApiRequest, HelpdeskClient};
use crate::config::job_config::{RegionRoute, RegionRoutingSettings};
use crate::core::bulk::{MutationPlan, MutationPlanner};
use crate::core::sequence::JobContext;
use crate::domain::model::{Company, Ticket};
use crate::domain::ports::{HelpdeskJob, JobOutput, Storage};
use crate::utils::error::{HelpdeskError, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// 依公司所在州別把工單分派到區域
pub struct RegionPlanner {
    settings: RegionRoutingSettings,
}

impl RegionPlanner {
    pub fn new(settings: RegionRoutingSettings) -> Self {
        Self { settings }
    }

    /// 找不到對應時使用 fallback
    pub fn route_for(&self, state: Option<&str>) -> Option<&RegionRoute> {
        state
            .and_then(|s| {
                self.settings
                    .states
                    .get(s)
                    .or_else(|| {
                        self.settings
                            .states
                            .iter()
                            .find(|(key, _)| key.eq_ignore_ascii_case(s))
                            .map(|(_, route)| route)
                    })
            })
            .or(self.settings.fallback.as_ref())
    }

    pub fn payload_for(&self, route: &RegionRoute) -> Value {
        let mut custom_fields = Map::new();
        custom_fields.insert(self.settings.region_field.clone(), json!(route.region));
        if let Some(manager) = &route.account_manager {
            custom_fields.insert(self.settings.manager_field.clone(), json!(manager));
        }

        let mut payload = Map::new();
        if let Some(group_id) = route.group_id {
            payload.insert("group_id".to_string(), json!(group_id));
        }
        if let Some(status) = self.settings.status {
            payload.insert("status".to_string(), json!(status));
        }
        payload.insert("custom_fields".to_string(), Value::Object(custom_fields));
        Value::Object(payload)
    }

    async fn company_state(&self, client: &HelpdeskClient, company_id: u64) -> Result<Option<String>> {
        match client.get_as::<Company>(&format!("companies/{}", company_id), &[]).await {
            Ok(company) => Ok(company.custom_text(&self.settings.state_field).map(str::to_string)),
            Err(HelpdeskError::NotFound { .. }) => {
                tracing::warn!("⚠️ Company {} not found", company_id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl MutationPlanner<u64> for RegionPlanner {
    async fn plan(&self, client: &HelpdeskClient, ticket_id: &u64) -> Result<MutationPlan> {
        let path = format!("tickets/{}", ticket_id);
        let ticket: Ticket = client.get_as(&path, &[]).await?;

        let (state, reason) = match ticket.company_id {
            None => (None, "no company associated"),
            Some(company_id) => match self.company_state(client, company_id).await? {
                Some(state) => (Some(state), "no region mapping for state"),
                None => (None, "no state present"),
            },
        };

        let Some(route) = self.route_for(state.as_deref()) else {
            let reason = match &state {
                Some(s) => format!("{} '{}'", reason, s),
                None => reason.to_string(),
            };
            return Ok(MutationPlan::skip(reason)
                .with_context("State", state.unwrap_or_default())
                .with_context("Region", ""));
        };

        Ok(MutationPlan::write(ApiRequest::put(path, self.payload_for(route)))
            .with_context("State", state.unwrap_or_default())
            .with_context("Region", route.region.clone())
            .with_context("Account Manager", route.account_manager.clone().unwrap_or_default()))
    }

    fn context_columns(&self) -> &[&'static str] {
        &["State", "Region", "Account Manager"]
    }

    fn success_label(&self) -> &'static str {
        "routed"
    }
}

pub struct RouteRegionJob<S: Storage> {
    name: String,
    targets: TargetSource,
    settings: RegionRoutingSettings,
    dedupe: bool,
    env: Arc<JobEnv<S>>,
}

impl<S: Storage> RouteRegionJob<S> {
    pub fn new(
        name: String,
        targets: TargetSource,
        settings: RegionRoutingSettings,
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
impl<S: Storage + 'static> HelpdeskJob for RouteRegionJob<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, context: &JobContext) -> Result<JobOutput> {
        let ids = self.targets.resolve_ids(context).await?;
        tracing::info!(
            "🗺️ Routing {} tickets across {} state mappings",
            ids.len(),
            self.settings.states.len()
        );

        let planner = RegionPlanner::new(self.settings.clone());
        let base_name = format!("{}_results", self.name);
        self.env
            .run_bulk(context, &base_name, "Ticket ID", &ids, &planner, self.dedupe)
            .await
    }
}
