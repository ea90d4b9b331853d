//! 具體作業：匯出、批次更新與聯絡人清理。
//!
//! 每個 `[[jobs]]` 項目經由 [`build_job`] 轉成一個 [`HelpdeskJob`]，
//! 共用同一個 [`JobEnv`]（客戶端、儲存空間、輸出格式、批次設定）。

pub mod articles;
pub mod contact_cleanup;
pub mod export_records;
pub mod field_update;
pub mod merged_tickets;
pub mod region_routing;
pub mod sla_policies;
pub mod tags;
pub mod ticket_activities;

use crate::client::HelpdeskClient;
use crate::config::job_config::{JobDefinition, JobFile, JobKind};
use crate::core::bulk::{BulkMutator, BulkOptions, MutationPlanner};
use crate::core::export::{Exporter, OutputFormat, Table};
use crate::core::sequence::JobContext;
use crate::domain::model::Record;
use crate::domain::ports::{HelpdeskJob, JobOutput, Storage};
use crate::utils::error::{HelpdeskError, Result};
use crate::utils::text::parse_id_list;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

/// 所有作業共用的執行環境
pub struct JobEnv<S: Storage> {
    pub client: Arc<HelpdeskClient>,
    pub storage: S,
    pub formats: Vec<OutputFormat>,
    pub file_prefix: String,
    pub bulk: BulkOptions,
    /// 入口網站網域，用於辨識工單連結
    pub portal_domain: Option<String>,
}

impl<S: Storage> JobEnv<S> {
    pub fn from_config(config: &JobFile, client: Arc<HelpdeskClient>, storage: S) -> Self {
        Self {
            client,
            storage,
            formats: config.output.formats.clone(),
            file_prefix: config.output.file_prefix.clone(),
            bulk: BulkOptions {
                delay_between: config.rate_limit.delay_between(),
                dedupe_ids: false,
            },
            portal_domain: config.helpdesk.portal_domain(),
        }
    }

    pub fn exporter(&self) -> Exporter<'_, S> {
        Exporter::new(&self.storage, self.formats.clone()).with_prefix(self.file_prefix.clone())
    }

    /// 寫出表格並組成作業輸出
    pub async fn export_table(&self, base_name: &str, table: &Table, records: Vec<Record>) -> Result<JobOutput> {
        let output_files = self.exporter().write_all(base_name, table, &records).await?;
        let mut output = JobOutput {
            records,
            output_files,
            ..JobOutput::default()
        };
        output.metadata.insert("rows".to_string(), table.len().into());
        Ok(output)
    }

    /// 依序對每個目標執行寫入，並把逐筆結果寫成檔案
    pub async fn run_bulk<K>(
        &self,
        context: &JobContext,
        base_name: &str,
        key_label: &str,
        keys: &[K],
        planner: &dyn MutationPlanner<K>,
        dedupe: bool,
    ) -> Result<JobOutput>
    where
        K: Display + Clone + Eq + Hash + Send + Sync,
    {
        let options = BulkOptions {
            dedupe_ids: dedupe || self.bulk.dedupe_ids,
            ..self.bulk.clone()
        };
        let mutator = BulkMutator::new(self.client.clone(), options).with_stop_flag(context.stop.clone());
        let report = mutator.run(keys, planner).await;

        let records = report.to_records(key_label);
        let table = Table::with_columns(report.columns(key_label), &records);
        let mut output = self.export_table(base_name, &table, records).await?;
        output.metadata.extend(report.summary());
        Ok(output)
    }
}

/// 目標清單的來源：設定中直接列出、檔案、或前一個作業的輸出欄位
#[derive(Debug, Clone, Default)]
pub struct TargetSource {
    pub inline: Vec<String>,
    pub file: Option<String>,
    pub from_job: Option<(String, String)>,
}

impl TargetSource {
    pub fn from_definition(definition: &JobDefinition) -> Self {
        Self {
            inline: definition.ids.iter().map(|id| id.to_string()).collect(),
            file: definition.ids_file.clone(),
            from_job: definition.from_job.clone().map(|job| {
                let field = definition.id_field.clone().unwrap_or_else(|| "id".to_string());
                (job, field)
            }),
        }
    }

    /// 逐一合併各來源，保留順序與重複項
    pub async fn resolve(&self, context: &JobContext) -> Result<Vec<String>> {
        let mut values = self.inline.clone();

        if let Some(path) = &self.file {
            let content = tokio::fs::read_to_string(path).await?;
            values.extend(
                content
                    .split(|c: char| c.is_whitespace() || c == ',')
                    .filter(|token| !token.is_empty())
                    .map(str::to_string),
            );
        }

        if let Some((job, field)) = &self.from_job {
            values.extend(context.column_values(job, field)?);
        }

        Ok(values)
    }

    pub async fn resolve_ids(&self, context: &JobContext) -> Result<Vec<u64>> {
        let joined = self.resolve(context).await?.join(" ");
        parse_id_list(&joined).map_err(|message| HelpdeskError::ProcessingError { message })
    }
}

fn base_name(definition: &JobDefinition, file_name: Option<&String>) -> String {
    file_name.cloned().unwrap_or_else(|| definition.name.clone())
}

/// 依設定建立作業
pub fn build_job<S: Storage + 'static>(definition: &JobDefinition, env: Arc<JobEnv<S>>) -> Box<dyn HelpdeskJob> {
    let name = definition.name.clone();
    let targets = TargetSource::from_definition(definition);
    let dedupe = definition.dedupe;

    match &definition.kind {
        JobKind::ExportTickets(settings) => Box::new(export_records::TicketExportJob::new(
            name,
            base_name(definition, settings.file_name.as_ref()),
            settings.clone(),
            env,
        )),
        JobKind::ExportContacts(settings) => Box::new(export_records::ListExportJob::new(
            name,
            "contacts",
            base_name(definition, settings.file_name.as_ref()),
            settings.clone(),
            env,
        )),
        JobKind::ExportCompanies(settings) => Box::new(export_records::ListExportJob::new(
            name,
            "companies",
            base_name(definition, settings.file_name.as_ref()),
            settings.clone(),
            env,
        )),
        JobKind::ExportAgents(settings) => Box::new(export_records::AgentExportJob::new(
            name,
            base_name(definition, settings.file_name.as_ref()),
            settings.clone(),
            env,
        )),
        JobKind::ExportSlaPolicies(settings) => Box::new(sla_policies::SlaPolicyExportJob::new(
            name,
            base_name(definition, settings.file_name.as_ref()),
            settings.clone(),
            env,
        )),
        JobKind::ExportArticles(settings) => Box::new(articles::ArticleExportJob::new(
            name,
            base_name(definition, settings.file_name.as_ref()),
            settings.clone(),
            env,
        )),
        JobKind::AddTags(settings) => Box::new(tags::AddTagsJob::new(
            name,
            targets,
            settings.clone(),
            dedupe,
            env,
        )),
        JobKind::UpdateFields(settings) => Box::new(field_update::UpdateFieldsJob::new(
            name,
            targets,
            settings.clone(),
            dedupe,
            env,
        )),
        JobKind::RouteRegion(settings) => Box::new(region_routing::RouteRegionJob::new(
            name,
            targets,
            settings.clone(),
            dedupe,
            env,
        )),
        JobKind::FindMerged(settings) => Box::new(merged_tickets::FindMergedJob::new(
            name,
            targets,
            settings.clone(),
            env,
        )),
        JobKind::ExportTicketActivities(settings) => Box::new(ticket_activities::TicketActivityExportJob::new(
            name,
            base_name(definition, settings.file_name.as_ref()),
            targets,
            settings.clone(),
            env,
        )),
        JobKind::DeleteContacts(settings) => {
            let mut targets = targets;
            targets.inline.extend(settings.emails.iter().cloned());
            if settings.emails_file.is_some() {
                targets.file = settings.emails_file.clone();
            }
            if let Some((_, field)) = targets.from_job.as_mut() {
                if definition.id_field.is_none() {
                    *field = "Email".to_string();
                }
            }
            Box::new(contact_cleanup::DeleteContactsJob::new(
                name,
                targets,
                settings.clone(),
                dedupe,
                env,
            ))
        }
    }
}
