use anyhow::Result;
use deskops::app::{build_job, JobEnv};
use deskops::core::bulk::new_stop_flag;
use deskops::core::sequence::{FailurePolicy, JobResult};
use deskops::domain::ports::HelpdeskJob;
use deskops::utils::validation::Validate;
use deskops::{HelpdeskClient, JobContext, JobFile, JobSequence, LocalStorage};
use httpmock::prelude::*;
use serde_json::json;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn job_file(server: &MockServer, output: &Path, formats: &str, jobs: &str) -> Result<JobFile> {
    let content = format!(
        r#"
[run]
name = "job-tests"
on_failure = "continue"

[helpdesk]
base_url = "{}"
api_key = "test-key"

[rate_limit]
server_error_retries = 0
delay_between_ms = 0

[output]
directory = "{}"
formats = {}

{}
"#,
        server.base_url(),
        output.to_string_lossy().replace('\\', "/"),
        formats,
        jobs
    );

    let config = JobFile::from_toml_str(&content)?;
    config.validate()?;
    Ok(config)
}

async fn run_jobs(config: &JobFile) -> Result<Vec<JobResult>> {
    let client = Arc::new(HelpdeskClient::new(config.client_settings()?)?);
    let storage = LocalStorage::new(&config.output.directory);
    let env = Arc::new(JobEnv::from_config(config, client, storage));

    let mut sequence = JobSequence::new("test_run").with_failure_policy(config.run.on_failure);
    for job in config.get_enabled_jobs() {
        sequence.add_job(build_job(job, env.clone()));
    }
    Ok(sequence.execute_all().await?)
}

fn single_job(config: &JobFile) -> Result<Box<dyn HelpdeskJob>> {
    let client = Arc::new(HelpdeskClient::new(config.client_settings()?)?);
    let storage = LocalStorage::new(&config.output.directory);
    let env = Arc::new(JobEnv::from_config(config, client, storage));
    Ok(build_job(&config.jobs[0], env))
}

fn read_csv(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.records() {
        rows.push(row?.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

#[tokio::test]
async fn test_add_tags_updates_only_missing_tags() -> Result<()> {
    let server = MockServer::start_async().await;
    let temp_dir = TempDir::new()?;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/tickets/1");
            then.status(200).json_body(json!({"id": 1, "tags": ["billing"]}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/tickets/2");
            then.status(200).json_body(json!({"id": 2, "tags": ["billing", "vip"]}));
        })
        .await;
    let put = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/tickets/1")
                .json_body(json!({"tags": ["billing", "vip"]}));
            then.status(200).json_body(json!({"id": 1}));
        })
        .await;
    let untouched = server
        .mock_async(|when, then| {
            when.method(PUT).path("/tickets/2");
            then.status(200).json_body(json!({"id": 2}));
        })
        .await;

    let config = job_file(
        &server,
        temp_dir.path(),
        r#"["csv"]"#,
        r#"
[[jobs]]
name = "tag-vips"
kind = "add_tags"
ids = [1, 2]
tags = ["vip"]
"#,
    )?;
    let results = run_jobs(&config).await?;

    put.assert_hits_async(1).await;
    untouched.assert_hits_async(0).await;

    let result = &results[0];
    assert!(result.is_success());
    assert_eq!(result.metadata["succeeded"], json!(1));
    assert_eq!(result.metadata["skipped"], json!(1));

    let rows = read_csv(&temp_dir.path().join("tag-vips_results.csv"))?;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][0], "Ticket ID");
    assert!(rows[2].contains(&"all tags already present".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_route_region_writes_mapped_tickets_and_reports_skips() -> Result<()> {
    let server = MockServer::start_async().await;
    let temp_dir = TempDir::new()?;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/tickets/10");
            then.status(200).json_body(json!({"id": 10, "company_id": 50}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/tickets/11");
            then.status(200).json_body(json!({"id": 11, "company_id": null}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/tickets/12");
            then.status(200).json_body(json!({"id": 12, "company_id": 51}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/companies/50");
            then.status(200)
                .json_body(json!({"id": 50, "custom_fields": {"state": "WA"}}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/companies/51");
            then.status(404);
        })
        .await;
    let put = server
        .mock_async(|when, then| {
            when.method(PUT).path("/tickets/10").json_body(json!({
                "group_id": 11,
                "custom_fields": {"cf_region": "West", "cf_account_manager": "Jamie Garcia"}
            }));
            then.status(200).json_body(json!({"id": 10}));
        })
        .await;

    let config = job_file(
        &server,
        temp_dir.path(),
        r#"["csv"]"#,
        r#"
[[jobs]]
name = "route"
kind = "route_region"
ids = [10, 11, 12]

[jobs.states.WA]
region = "West"
group_id = 11
account_manager = "Jamie Garcia"
"#,
    )?;
    let results = run_jobs(&config).await?;

    put.assert_hits_async(1).await;
    let result = &results[0];
    assert_eq!(result.metadata["succeeded"], json!(1));
    assert_eq!(result.metadata["skipped"], json!(2));
    assert_eq!(result.records[0].get("Region"), Some(&json!("West")));
    assert_eq!(
        result.records[1].get("Detail"),
        Some(&json!("no company associated"))
    );
    assert_eq!(result.records[2].get("Detail"), Some(&json!("no state present")));
    Ok(())
}

#[tokio::test]
async fn test_find_merged_reads_conversation_links() -> Result<()> {
    let server = MockServer::start_async().await;
    let temp_dir = TempDir::new()?;

    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/tickets/7/conversations")
                .query_param("page", "1");
            then.status(200).json_body(json!([
                {"id": 1, "body": "Merged https://acme.freshdesk.com/a/tickets/120 into https://acme.freshdesk.com/a/tickets/7"},
                {"id": 2, "body": "Also https://acme.freshdesk.com/a/tickets/121"}
            ]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/tickets/7/conversations")
                .query_param("page", "2");
            then.status(200).json_body(json!([]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/tickets/120");
            then.status(200).json_body(json!({
                "id": 120,
                "status": 5,
                "subject": "Printer on fire",
                "tags": ["hw"],
                "created_at": "2024-05-01T08:00:00Z"
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/tickets/121");
            then.status(404);
        })
        .await;

    let config = job_file(
        &server,
        temp_dir.path(),
        r#"["json"]"#,
        r#"
[[jobs]]
name = "merged"
kind = "find_merged"
ids = [7]
portal_domain = "acme.freshdesk.com"
"#,
    )?;
    let results = run_jobs(&config).await?;

    let result = &results[0];
    assert!(result.is_success());
    assert_eq!(result.records.len(), 2);
    assert_eq!(result.records[0].get("Merged Ticket ID"), Some(&json!(120)));
    assert_eq!(result.records[0].get("Status"), Some(&json!("Closed")));
    assert_eq!(result.records[1].get("Status"), Some(&json!("Not found")));
    assert_eq!(result.metadata["stopped"], json!(false));
    assert!(temp_dir.path().join("merged.json").exists());
    Ok(())
}

#[tokio::test]
async fn test_delete_contacts_requires_confirmation() -> Result<()> {
    let server = MockServer::start_async().await;
    let temp_dir = TempDir::new()?;

    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/contacts")
                .query_param("email", "ana@example.com");
            then.status(200)
                .json_body(json!([{"id": 31, "name": "Ana", "email": "ana@example.com"}]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/contacts")
                .query_param("email", "ghost@example.com");
            then.status(200).json_body(json!([]));
        })
        .await;
    let delete = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/contacts/31");
            then.status(204);
        })
        .await;

    let jobs = |confirm: bool| {
        format!(
            r#"
[[jobs]]
name = "cleanup"
kind = "delete_contacts"
emails = ["ana@example.com", "ghost@example.com"]
confirm = {}
"#,
            confirm
        )
    };

    let dry = job_file(&server, temp_dir.path(), r#"["csv"]"#, &jobs(false))?;
    let results = run_jobs(&dry).await?;
    delete.assert_hits_async(0).await;
    assert_eq!(results[0].metadata["skipped"], json!(2));
    assert_eq!(results[0].records[0].get("Contact ID"), Some(&json!(31)));

    let confirmed = job_file(&server, temp_dir.path(), r#"["csv"]"#, &jobs(true))?;
    let results = run_jobs(&confirmed).await?;
    delete.assert_hits_async(1).await;
    assert_eq!(results[0].metadata["succeeded"], json!(1));
    assert_eq!(results[0].records[0].get("Status"), Some(&json!("deleted")));
    assert_eq!(
        results[0].records[1].get("Detail"),
        Some(&json!("no contact found"))
    );
    Ok(())
}

#[tokio::test]
async fn test_agent_export_writes_csv_and_xlsx() -> Result<()> {
    let server = MockServer::start_async().await;
    let temp_dir = TempDir::new()?;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/agents").query_param("page", "1");
            then.status(200).json_body(json!([
                {
                    "id": 1,
                    "active": true,
                    "available": true,
                    "contact": {"name": "Dana", "email": "dana@example.com", "last_login_at": "2024-06-01T00:00:00Z"}
                },
                {"id": 2, "contact": {}}
            ]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/agents").query_param("page", "2");
            then.status(200).json_body(json!([]));
        })
        .await;

    let config = job_file(
        &server,
        temp_dir.path(),
        r#"["csv", "xlsx"]"#,
        r#"
[[jobs]]
name = "agents"
kind = "export_agents"
"#,
    )?;
    let results = run_jobs(&config).await?;
    assert_eq!(results[0].output_files.len(), 2);

    let rows = read_csv(&temp_dir.path().join("agents.csv"))?;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][0], "Agent ID");
    assert_eq!(rows[1][1], "Dana");
    assert_eq!(rows[2][1], "Unknown Agent");
    assert_eq!(rows[2][2], "N/A");

    let file = std::fs::File::open(temp_dir.path().join("agents.xlsx"))?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut sheet = String::new();
    archive
        .by_name("xl/worksheets/sheet1.xml")?
        .read_to_string(&mut sheet)?;
    assert_eq!(sheet.matches("<row ").count(), 3);
    assert!(sheet.contains("Dana"));
    Ok(())
}

#[tokio::test]
async fn test_sla_export_filters_and_keeps_raw_backup() -> Result<()> {
    let server = MockServer::start_async().await;
    let temp_dir = TempDir::new()?;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/sla_policies");
            then.status(200).json_body(json!([
                {
                    "id": 1,
                    "name": "Gold Support",
                    "is_default": false,
                    "active": true,
                    "sla_target": {
                        "priority_4": {"respond_within": 900, "resolve_within": 3600, "business_hours": false, "escalation_enabled": true},
                        "priority_1": {"respond_within": 86400, "resolve_within": 172800, "business_hours": true, "escalation_enabled": false}
                    }
                },
                {"id": 2, "name": "Default SLA", "is_default": true, "sla_target": {}}
            ]));
        })
        .await;

    let config = job_file(
        &server,
        temp_dir.path(),
        r#"["csv"]"#,
        r#"
[[jobs]]
name = "sla"
kind = "export_sla_policies"
name_filter = "gold"
"#,
    )?;
    let results = run_jobs(&config).await?;

    let result = &results[0];
    assert_eq!(result.metadata["policies"], json!(1));
    assert_eq!(result.records.len(), 2);
    assert_eq!(result.records[0].get("Priority"), Some(&json!("PRIORITY_4")));

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(temp_dir.path().join("sla_raw.json"))?)?;
    assert_eq!(raw.as_array().map(Vec::len), Some(1));
    assert!(temp_dir.path().join("sla.csv").exists());
    Ok(())
}

#[tokio::test]
async fn test_interrupted_export_writes_partial_file_and_fails() -> Result<()> {
    let server = MockServer::start_async().await;
    let temp_dir = TempDir::new()?;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/contacts").query_param("page", "1");
            then.status(200)
                .json_body(json!([{"id": 1, "name": "Ana"}, {"id": 2, "name": "Bo"}]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/contacts").query_param("page", "2");
            then.status(500).body("boom");
        })
        .await;

    let config = job_file(
        &server,
        temp_dir.path(),
        r#"["csv"]"#,
        r#"
[[jobs]]
name = "contacts"
kind = "export_contacts"
"#,
    )?;
    assert_eq!(config.run.on_failure, FailurePolicy::Continue);
    let results = run_jobs(&config).await?;

    assert!(!results[0].is_success());
    let rows = read_csv(&temp_dir.path().join("contacts.csv"))?;
    assert_eq!(rows.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_empty_exports_keep_header_row() -> Result<()> {
    let server = MockServer::start_async().await;
    let temp_dir = TempDir::new()?;

    for resource in ["/tickets", "/contacts"] {
        server
            .mock_async(|when, then| {
                when.method(GET).path(resource);
                then.status(200).json_body(json!([]));
            })
            .await;
    }

    let config = job_file(
        &server,
        temp_dir.path(),
        r#"["csv", "tsv"]"#,
        r#"
[[jobs]]
name = "tickets"
kind = "export_tickets"

[[jobs]]
name = "contacts"
kind = "export_contacts"

[[jobs]]
name = "tag-nothing"
kind = "add_tags"
from_job = "tickets"
tags = ["vip"]
"#,
    )?;
    let results = run_jobs(&config).await?;
    assert!(results.iter().all(|r| r.is_success()));

    let tickets = read_csv(&temp_dir.path().join("tickets.csv"))?;
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0][0], "id");
    assert!(tickets[0].contains(&"status_name".to_string()));

    let contacts = read_csv(&temp_dir.path().join("contacts.csv"))?;
    assert_eq!(contacts.len(), 1);
    assert!(contacts[0].contains(&"email".to_string()));

    let tags = std::fs::read_to_string(temp_dir.path().join("tag-nothing_results.csv"))?;
    assert_eq!(tags, "Ticket ID,Tags Added,Status,Detail\n");
    let tsv = std::fs::read_to_string(temp_dir.path().join("tag-nothing_results.tsv"))?;
    assert_eq!(tsv, "Ticket ID\tTags Added\tStatus\tDetail\n");
    Ok(())
}

#[tokio::test]
async fn test_article_export_stops_before_next_category() -> Result<()> {
    let server = MockServer::start_async().await;
    let temp_dir = TempDir::new()?;

    let categories = server
        .mock_async(|when, then| {
            when.method(GET).path("/solutions/categories");
            then.status(200).json_body(json!([
                {"id": 1, "name": "Getting Started"},
                {"id": 2, "name": "Billing"}
            ]));
        })
        .await;
    let folders = server
        .mock_async(|when, then| {
            when.method(GET).path_contains("/folders");
            then.status(200).json_body(json!([]));
        })
        .await;

    let config = job_file(
        &server,
        temp_dir.path(),
        r#"["csv"]"#,
        r#"
[[jobs]]
name = "kb"
kind = "export_articles"
"#,
    )?;
    let job = single_job(&config)?;

    let stop = new_stop_flag();
    stop.store(true, std::sync::atomic::Ordering::SeqCst);
    let context = JobContext::new("stopped_run").with_stop_flag(stop);
    let output = job.run(&context).await?;

    categories.assert_hits_async(1).await;
    folders.assert_hits_async(0).await;
    assert_eq!(output.metadata["stopped"], json!(true));

    let rows = read_csv(&temp_dir.path().join("kb.csv"))?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], "Category");
    Ok(())
}

#[tokio::test]
async fn test_ticket_activities_filtered_by_window() -> Result<()> {
    let server = MockServer::start_async().await;
    let temp_dir = TempDir::new()?;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/tickets/7/activities");
            then.status(200).json_body(json!([
                {"id": 1, "ticket_id": 7, "activity_type": "note", "performer_id": 42,
                 "description": "<p>Called back</p>", "created_at": "2024-05-01T09:30:00Z"},
                {"id": 2, "ticket_id": 7, "activity_type": "status_change",
                 "description": "Closed", "created_at": "2024-05-03T12:00:00Z"}
            ]));
        })
        .await;
    let broken = server
        .mock_async(|when, then| {
            when.method(GET).path("/tickets/8/activities");
            then.status(500).body("boom");
        })
        .await;

    let config = job_file(
        &server,
        temp_dir.path(),
        r#"["csv"]"#,
        r#"
[[jobs]]
name = "activities"
kind = "export_ticket_activities"
ids = [7, 8]
since = "2024-05-01T00:00:00Z"
until = "2024-05-01T23:59:59Z"
"#,
    )?;
    let results = run_jobs(&config).await?;

    broken.assert_hits_async(1).await;
    let result = &results[0];
    assert!(result.is_success());
    assert_eq!(result.metadata["fetch_failures"], json!(1));
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.records[0].get("Performer ID"), Some(&json!(42)));

    let rows = read_csv(&temp_dir.path().join("activities.csv"))?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][0], "7");
    assert_eq!(rows[1][5], "Called back");
    Ok(())
}
