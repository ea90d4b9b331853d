use crate::client::{ClientSettings, RetryPolicy};
use crate::core::export::OutputFormat;
use crate::core::sequence::FailurePolicy;
use crate::utils::error::{HelpdeskError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

/// 作業設定檔（TOML）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFile {
    pub run: RunSection,
    pub helpdesk: HelpdeskSection,
    #[serde(default)]
    pub rate_limit: RateLimitSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub jobs: Vec<JobDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSection {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub on_failure: FailurePolicy,
    #[serde(default)]
    pub monitor: bool,
    /// 未指定 `--log-file` 時使用
    pub log_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelpdeskSection {
    /// 例如 `acme.freshdesk.com`
    pub domain: Option<String>,
    /// 覆寫 `https://{domain}/api/v2`，測試或代理時使用
    pub base_url: Option<String>,
    pub api_key: String,
    pub timeout_seconds: Option<u64>,
    pub user_agent: Option<String>,
}

impl HelpdeskSection {
    pub fn api_base_url(&self) -> Result<String> {
        match (&self.base_url, &self.domain) {
            (Some(base_url), _) => Ok(base_url.trim_end_matches('/').to_string()),
            (None, Some(domain)) => Ok(format!("https://{}/api/v2", domain.trim())),
            (None, None) => Err(HelpdeskError::MissingConfigError {
                field: "helpdesk.domain".to_string(),
            }),
        }
    }

    /// 入口網站主機名稱，用來辨識工單內的連結
    pub fn portal_domain(&self) -> Option<String> {
        if let Some(domain) = &self.domain {
            return Some(domain.trim().to_string());
        }
        self.base_url
            .as_deref()
            .and_then(|base| url::Url::parse(base).ok())
            .and_then(|url| url.host_str().map(str::to_string))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    pub min_request_interval_ms: u64,
    pub default_retry_after_seconds: u64,
    pub max_rate_limit_retries: u32,
    pub server_error_retries: u32,
    pub server_error_backoff_seconds: u64,
    pub low_remaining_threshold: Option<u32>,
    pub low_remaining_pause_seconds: u64,
    /// 批次作業兩筆之間的等待
    pub delay_between_ms: u64,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            min_request_interval_ms: 0,
            default_retry_after_seconds: 60,
            max_rate_limit_retries: 5,
            server_error_retries: 2,
            server_error_backoff_seconds: 5,
            low_remaining_threshold: None,
            low_remaining_pause_seconds: 10,
            delay_between_ms: 250,
        }
    }
}

impl RateLimitSection {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            default_retry_after: Duration::from_secs(self.default_retry_after_seconds),
            max_rate_limit_retries: self.max_rate_limit_retries,
            server_error_retries: self.server_error_retries,
            server_error_backoff: Duration::from_secs(self.server_error_backoff_seconds),
            low_remaining_threshold: self.low_remaining_threshold,
            low_remaining_pause: Duration::from_secs(self.low_remaining_pause_seconds),
        }
    }

    pub fn delay_between(&self) -> Duration {
        Duration::from_millis(self.delay_between_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub directory: String,
    pub formats: Vec<OutputFormat>,
    pub file_prefix: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            directory: "./output".to_string(),
            formats: vec![OutputFormat::Csv],
            file_prefix: String::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// `[[jobs]]` 的單一項目；`kind` 決定其餘欄位
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 直接列出的目標 ID
    #[serde(default)]
    pub ids: Vec<u64>,
    /// 以空白或逗號分隔的 ID 檔案，相對於執行目錄
    pub ids_file: Option<String>,
    /// 使用前一個作業輸出的欄位作為目標
    pub from_job: Option<String>,
    pub id_field: Option<String>,
    #[serde(default)]
    pub dedupe: bool,
    #[serde(flatten)]
    pub kind: JobKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    ExportTickets(TicketExportSettings),
    ExportContacts(ListExportSettings),
    ExportCompanies(ListExportSettings),
    ExportAgents(ListExportSettings),
    ExportSlaPolicies(SlaExportSettings),
    ExportArticles(ArticleExportSettings),
    AddTags(AddTagsSettings),
    UpdateFields(UpdateFieldsSettings),
    RouteRegion(RegionRoutingSettings),
    FindMerged(MergedTicketSettings),
    ExportTicketActivities(TicketActivitySettings),
    DeleteContacts(DeleteContactsSettings),
}

impl JobKind {
    pub fn label(&self) -> &'static str {
        match self {
            JobKind::ExportTickets(_) => "export_tickets",
            JobKind::ExportContacts(_) => "export_contacts",
            JobKind::ExportCompanies(_) => "export_companies",
            JobKind::ExportAgents(_) => "export_agents",
            JobKind::ExportSlaPolicies(_) => "export_sla_policies",
            JobKind::ExportArticles(_) => "export_articles",
            JobKind::AddTags(_) => "add_tags",
            JobKind::UpdateFields(_) => "update_fields",
            JobKind::RouteRegion(_) => "route_region",
            JobKind::FindMerged(_) => "find_merged",
            JobKind::ExportTicketActivities(_) => "export_ticket_activities",
            JobKind::DeleteContacts(_) => "delete_contacts",
        }
    }

    /// 需要目標 ID 清單的作業
    pub fn takes_ids(&self) -> bool {
        matches!(
            self,
            JobKind::AddTags(_)
                | JobKind::UpdateFields(_)
                | JobKind::RouteRegion(_)
                | JobKind::FindMerged(_)
                | JobKind::ExportTicketActivities(_)
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketExportSettings {
    /// 只匯出最近 N 天內更新的工單
    pub days_back: Option<u32>,
    pub updated_since: Option<String>,
    /// 例如 `requester,stats`
    pub include: Option<String>,
    pub max_pages: Option<u32>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListExportSettings {
    pub query: HashMap<String, String>,
    pub max_pages: Option<u32>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaExportSettings {
    /// 名稱包含此字串（不分大小寫）的政策才匯出
    pub name_filter: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleExportSettings {
    /// 空白代表全部分類
    pub category_ids: Vec<u64>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddTagsSettings {
    pub tags: Vec<String>,
}

fn default_ticket_path() -> String {
    "tickets/{id}".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateFieldsSettings {
    #[serde(default = "default_ticket_path")]
    pub path: String,
    pub payload: Value,
    /// 先讀取現有值，全部相同時略過
    #[serde(default)]
    pub skip_if_matching: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRoute {
    pub region: String,
    pub group_id: Option<u64>,
    pub account_manager: Option<String>,
}

fn default_state_field() -> String {
    "state".to_string()
}

fn default_region_field() -> String {
    "cf_region".to_string()
}

fn default_manager_field() -> String {
    "cf_account_manager".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionRoutingSettings {
    /// 公司自訂欄位中存放州別的欄位
    #[serde(default = "default_state_field")]
    pub state_field: String,
    #[serde(default)]
    pub states: HashMap<String, RegionRoute>,
    pub fallback: Option<RegionRoute>,
    /// 同時設定工單狀態，例如 2 = Open
    pub status: Option<i64>,
    #[serde(default = "default_region_field")]
    pub region_field: String,
    #[serde(default = "default_manager_field")]
    pub manager_field: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MergedTicketSettings {
    /// 覆寫連結中的入口網站網域
    pub portal_domain: Option<String>,
}

/// 只保留 `created_at` 落在區間內的活動，兩端皆包含
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketActivitySettings {
    pub since: Option<String>,
    pub until: Option<String>,
    /// 例如 `["status_change", "note"]`；空白代表全部
    pub activity_types: Vec<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteContactsSettings {
    pub emails: Vec<String>,
    pub emails_file: Option<String>,
    /// 未設定時只回報找到的聯絡人
    pub confirm: bool,
    /// 永久刪除（hard delete）
    pub permanent: bool,
}

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static env pattern"))
}

impl JobFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);

        toml::from_str(&processed).map_err(|e| HelpdeskError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 將 `${VAR}` 替換為環境變數；不存在的變數原樣保留，交由驗證階段報錯
    fn substitute_env_vars(content: &str) -> String {
        env_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn client_settings(&self) -> Result<ClientSettings> {
        let mut settings = ClientSettings::new(self.helpdesk.api_base_url()?, self.helpdesk.api_key.clone());
        if let Some(timeout) = self.helpdesk.timeout_seconds {
            settings.timeout = Duration::from_secs(timeout);
        }
        settings.user_agent = self.helpdesk.user_agent.clone();
        settings.min_request_interval = Duration::from_millis(self.rate_limit.min_request_interval_ms);
        settings.policy = self.rate_limit.retry_policy();
        Ok(settings)
    }

    pub fn get_enabled_jobs(&self) -> Vec<&JobDefinition> {
        self.jobs.iter().filter(|j| j.enabled).collect()
    }

    pub fn get_job(&self, name: &str) -> Option<&JobDefinition> {
        self.jobs.iter().find(|j| j.name == name)
    }

    /// `--only` / `--skip` 篩選後，`from_job` 的來源也必須在執行清單中
    pub fn validate_selection(&self, selected: &[&JobDefinition]) -> Result<()> {
        for job in selected {
            let Some(from_job) = &job.from_job else {
                continue;
            };
            if !selected.iter().any(|j| &j.name == from_job) {
                return Err(HelpdeskError::ConfigValidationError {
                    field: format!("jobs.{}.from_job", job.name),
                    message: format!(
                        "Job '{}' is not selected for this run but '{}' reads its output",
                        from_job, job.name
                    ),
                });
            }
        }
        Ok(())
    }

    fn validate_job(&self, index: usize, job: &JobDefinition) -> Result<()> {
        let field = |suffix: &str| format!("jobs.{}.{}", job.name, suffix);

        validation::validate_non_empty_string(&format!("jobs[{}].name", index), &job.name)?;

        if let Some(from_job) = &job.from_job {
            match self.jobs[..index].iter().find(|j| &j.name == from_job) {
                None => {
                    return Err(HelpdeskError::ConfigValidationError {
                        field: field("from_job"),
                        message: format!("Job '{}' must be defined before '{}'", from_job, job.name),
                    })
                }
                Some(source) if job.enabled && !source.enabled => {
                    return Err(HelpdeskError::ConfigValidationError {
                        field: field("from_job"),
                        message: format!("Job '{}' is disabled but '{}' reads its output", from_job, job.name),
                    })
                }
                Some(_) => {}
            }
        }

        if let Some(path) = &job.ids_file {
            validation::validate_path(&field("ids_file"), path)?;
        }

        let has_id_source = !job.ids.is_empty() || job.ids_file.is_some() || job.from_job.is_some();
        if job.kind.takes_ids() && !has_id_source {
            return Err(HelpdeskError::MissingConfigError {
                field: field("ids | ids_file | from_job"),
            });
        }

        match &job.kind {
            JobKind::AddTags(settings) => {
                if settings.tags.iter().all(|t| t.trim().is_empty()) {
                    return Err(HelpdeskError::MissingConfigError { field: field("tags") });
                }
            }
            JobKind::UpdateFields(settings) => {
                validation::validate_non_empty_string(&field("path"), &settings.path)?;
                if !settings.path.contains("{id}") {
                    return Err(HelpdeskError::InvalidConfigValueError {
                        field: field("path"),
                        value: settings.path.clone(),
                        reason: "Path template must contain {id}".to_string(),
                    });
                }
                match &settings.payload {
                    Value::Object(map) if !map.is_empty() => {}
                    other => {
                        return Err(HelpdeskError::InvalidConfigValueError {
                            field: field("payload"),
                            value: other.to_string(),
                            reason: "Payload must be a non-empty table".to_string(),
                        })
                    }
                }
            }
            JobKind::RouteRegion(settings) => {
                if settings.states.is_empty() && settings.fallback.is_none() {
                    return Err(HelpdeskError::MissingConfigError { field: field("states") });
                }
                validation::validate_non_empty_string(&field("state_field"), &settings.state_field)?;
            }
            JobKind::DeleteContacts(settings) => {
                let has_source = !settings.emails.is_empty()
                    || settings.emails_file.is_some()
                    || job.from_job.is_some();
                if !has_source {
                    return Err(HelpdeskError::MissingConfigError {
                        field: field("emails | emails_file | from_job"),
                    });
                }
                for email in &settings.emails {
                    validation::validate_email(&field("emails"), email)?;
                }
            }
            JobKind::ExportTickets(settings) => {
                if let Some(since) = &settings.updated_since {
                    validation::validate_rfc3339(&field("updated_since"), since)?;
                }
            }
            JobKind::ExportTicketActivities(settings) => {
                if let Some(since) = &settings.since {
                    validation::validate_rfc3339(&field("since"), since)?;
                }
                if let Some(until) = &settings.until {
                    validation::validate_rfc3339(&field("until"), until)?;
                }
            }
            _ => {}
        }

        Ok(())
    }
}

impl Validate for JobFile {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("run.name", &self.run.name)?;

        match (&self.helpdesk.base_url, &self.helpdesk.domain) {
            (Some(base_url), _) => validation::validate_url("helpdesk.base_url", base_url)?,
            (None, Some(domain)) => {
                validation::validate_no_placeholder("helpdesk.domain", domain)?;
                validation::validate_domain("helpdesk.domain", domain)?;
            }
            (None, None) => {
                return Err(HelpdeskError::MissingConfigError {
                    field: "helpdesk.domain".to_string(),
                })
            }
        }

        validation::validate_non_empty_string("helpdesk.api_key", &self.helpdesk.api_key)?;
        validation::validate_no_placeholder("helpdesk.api_key", &self.helpdesk.api_key)?;

        if let Some(timeout) = self.helpdesk.timeout_seconds {
            validation::validate_range("helpdesk.timeout_seconds", timeout, 1, 600)?;
        }

        validation::validate_path("output.directory", &self.output.directory)?;
        if self.output.formats.is_empty() {
            return Err(HelpdeskError::MissingConfigError {
                field: "output.formats".to_string(),
            });
        }

        validation::validate_unique_names("jobs.name", self.jobs.iter().map(|j| j.name.as_str()))?;
        for (index, job) in self.jobs.iter().enumerate() {
            self.validate_job(index, job)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[run]
name = "weekly-maintenance"
on_failure = "continue"

[helpdesk]
domain = "acme.freshdesk.com"
api_key = "secret"
timeout_seconds = 20

[rate_limit]
min_request_interval_ms = 220
max_rate_limit_retries = 3

[output]
directory = "./out"
formats = ["csv", "xlsx"]
file_prefix = "weekly_"

[[jobs]]
name = "recent-tickets"
kind = "export_tickets"
days_back = 7
include = "requester"

[[jobs]]
name = "tag-them"
kind = "add_tags"
from_job = "recent-tickets"
id_field = "id"
tags = ["reviewed"]

[[jobs]]
name = "route"
kind = "route_region"
ids = [1, 2]
status = 2

[jobs.states.WA]
region = "West"
group_id = 5001
account_manager = "Jamie"

[jobs.fallback]
region = "Northeast"

[[jobs]]
name = "internal-flag"
kind = "update_fields"
ids_file = "ids.txt"
enabled = false
payload = { custom_fields = { cf_internal = true } }
"#;

    #[test]
    fn test_parse_full_job_file() {
        let config = JobFile::from_toml_str(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.run.on_failure, FailurePolicy::Continue);
        assert_eq!(config.output.formats, vec![OutputFormat::Csv, OutputFormat::Xlsx]);
        assert_eq!(config.jobs.len(), 4);
        assert_eq!(config.get_enabled_jobs().len(), 3);

        match &config.jobs[0].kind {
            JobKind::ExportTickets(settings) => {
                assert_eq!(settings.days_back, Some(7));
                assert_eq!(settings.include.as_deref(), Some("requester"));
            }
            other => panic!("unexpected kind {:?}", other),
        }

        match &config.jobs[2].kind {
            JobKind::RouteRegion(settings) => {
                assert_eq!(settings.state_field, "state");
                assert_eq!(settings.states["WA"].group_id, Some(5001));
                assert_eq!(settings.fallback.as_ref().unwrap().region, "Northeast");
                assert_eq!(settings.region_field, "cf_region");
            }
            other => panic!("unexpected kind {:?}", other),
        }

        match &config.get_job("internal-flag").unwrap().kind {
            JobKind::UpdateFields(settings) => {
                assert_eq!(settings.path, "tickets/{id}");
                assert_eq!(
                    settings.payload,
                    serde_json::json!({"custom_fields": {"cf_internal": true}})
                );
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_client_settings_from_config() {
        let config = JobFile::from_toml_str(SAMPLE).unwrap();
        let settings = config.client_settings().unwrap();

        assert_eq!(settings.base_url, "https://acme.freshdesk.com/api/v2");
        assert_eq!(settings.timeout, Duration::from_secs(20));
        assert_eq!(settings.min_request_interval, Duration::from_millis(220));
        assert_eq!(settings.policy.max_rate_limit_retries, 3);
        assert_eq!(settings.policy.default_retry_after, Duration::from_secs(60));
        assert_eq!(config.rate_limit.delay_between(), Duration::from_millis(250));
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("DESKOPS_TEST_API_KEY", "from-env");
        let content = SAMPLE.replace("\"secret\"", "\"${DESKOPS_TEST_API_KEY}\"");
        let config = JobFile::from_toml_str(&content).unwrap();
        assert_eq!(config.helpdesk.api_key, "from-env");
    }

    #[test]
    fn test_unresolved_placeholder_fails_validation() {
        let content = SAMPLE.replace("\"secret\"", "\"${DESKOPS_DEFINITELY_UNSET_VAR}\"");
        let config = JobFile::from_toml_str(&content).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("helpdesk.api_key"));
    }

    #[test]
    fn test_from_job_must_reference_earlier_job() {
        let content = r#"
[run]
name = "x"

[helpdesk]
domain = "acme.freshdesk.com"
api_key = "k"

[[jobs]]
name = "tag"
kind = "add_tags"
from_job = "later"
tags = ["a"]

[[jobs]]
name = "later"
kind = "export_contacts"
"#;
        let config = JobFile::from_toml_str(content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_job_source_must_be_enabled() {
        let content = r#"
[run]
name = "x"

[helpdesk]
domain = "acme.freshdesk.com"
api_key = "k"

[[jobs]]
name = "export"
kind = "export_tickets"
enabled = false

[[jobs]]
name = "tag"
kind = "add_tags"
from_job = "export"
tags = ["a"]
"#;
        let config = JobFile::from_toml_str(content).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("jobs.tag.from_job"));

        // 兩者都停用時不檢查
        let both_disabled = content.replace("tags = [\"a\"]", "tags = [\"a\"]\nenabled = false");
        let config = JobFile::from_toml_str(&both_disabled).unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_selection_must_include_from_job_source() {
        let config = JobFile::from_toml_str(SAMPLE).unwrap();
        let enabled = config.get_enabled_jobs();
        config.validate_selection(&enabled).unwrap();

        let without_export: Vec<&JobDefinition> = enabled
            .iter()
            .copied()
            .filter(|j| j.name != "recent-tickets")
            .collect();
        let err = config.validate_selection(&without_export).unwrap_err();
        assert!(err.to_string().contains("jobs.tag-them.from_job"));
    }

    #[test]
    fn test_bulk_job_requires_ids() {
        let content = r#"
[run]
name = "x"

[helpdesk]
base_url = "http://127.0.0.1:8080/api/v2"
api_key = "k"

[[jobs]]
name = "tag"
kind = "add_tags"
tags = ["a"]
"#;
        let config = JobFile::from_toml_str(content).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, HelpdeskError::MissingConfigError { .. }));
        assert_eq!(
            config.helpdesk.portal_domain().as_deref(),
            Some("127.0.0.1")
        );
    }

    #[test]
    fn test_update_fields_path_needs_placeholder() {
        let content = r#"
[run]
name = "x"

[helpdesk]
domain = "acme.freshdesk.com"
api_key = "k"

[[jobs]]
name = "update"
kind = "update_fields"
ids = [1]
path = "tickets/1"
payload = { status = 5 }
"#;
        let config = JobFile::from_toml_str(content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let content = r#"
[run]
name = "x"

[helpdesk]
domain = "acme.freshdesk.com"
api_key = "k"

[[jobs]]
name = "nope"
kind = "create_tickets"
"#;
        assert!(JobFile::from_toml_str(content).is_err());
    }
}
