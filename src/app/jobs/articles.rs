use super::JobEnv;
use crate::client::PageOptions;
use crate::config::job_config::ArticleExportSettings;
use crate::core::export::Table;
use crate::core::sequence::JobContext;
use crate::domain::model::{Record, SolutionArticle, SolutionCategory, SolutionFolder};
use crate::domain::ports::{HelpdeskJob, JobOutput, Storage};
use crate::utils::error::Result;
use crate::utils::text::clean_html;
use async_trait::async_trait;
use std::sync::Arc;

pub const ARTICLE_COLUMNS: [&str; 7] = [
    "Category",
    "Folder",
    "Article ID",
    "Title",
    "Description",
    "Created At",
    "Updated At",
];

pub fn article_record(category: &SolutionCategory, folder: &SolutionFolder, article: &SolutionArticle) -> Record {
    Record::new()
        .with("Category", category.name.clone())
        .with("Folder", folder.name.clone())
        .with("Article ID", article.id)
        .with("Title", article.title.clone())
        .with(
            "Description",
            clean_html(article.description.as_deref().unwrap_or_default()),
        )
        .with("Created At", article.created_at.clone().unwrap_or_default())
        .with("Updated At", article.updated_at.clone().unwrap_or_default())
}

/// 知識庫匯出：分類 → 資料夾 → 文章
pub struct ArticleExportJob<S: Storage> {
    name: String,
    base_name: String,
    settings: ArticleExportSettings,
    env: Arc<JobEnv<S>>,
}

impl<S: Storage> ArticleExportJob<S> {
    pub fn new(name: String, base_name: String, settings: ArticleExportSettings, env: Arc<JobEnv<S>>) -> Self {
        Self {
            name,
            base_name,
            settings,
            env,
        }
    }

    async fn categories(&self) -> Result<Vec<SolutionCategory>> {
        let categories: Vec<SolutionCategory> =
            self.env.client.get_as("solutions/categories", &[]).await?;

        if self.settings.category_ids.is_empty() {
            return Ok(categories);
        }
        Ok(categories
            .into_iter()
            .filter(|c| self.settings.category_ids.contains(&c.id))
            .collect())
    }
}

#[async_trait]
impl<S: Storage + 'static> HelpdeskJob for ArticleExportJob<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, context: &JobContext) -> Result<JobOutput> {
        let client = &self.env.client;
        let mut records = Vec::new();
        let mut stopped = false;

        'categories: for category in self.categories().await? {
            if context.is_stopped() {
                stopped = true;
                break;
            }

            let folders: Vec<SolutionFolder> = client
                .get_as(&format!("solutions/categories/{}/folders", category.id), &[])
                .await?;
            tracing::info!("📚 Category '{}': {} folders", category.name, folders.len());

            for folder in &folders {
                if context.is_stopped() {
                    stopped = true;
                    break 'categories;
                }

                let fetch = client
                    .get_paginated(
                        &format!("solutions/folders/{}/articles", folder.id),
                        &[],
                        &PageOptions::default(),
                    )
                    .await;
                let articles: Vec<SolutionArticle> = fetch.decode()?;
                if let Some(e) = fetch.interruption {
                    return Err(e);
                }

                records.extend(
                    articles
                        .iter()
                        .map(|article| article_record(&category, folder, article)),
                );
            }
        }

        if stopped {
            tracing::warn!("🛑 Stop requested, article export ends early with {} articles", records.len());
        }

        let columns = ARTICLE_COLUMNS.iter().map(|c| c.to_string()).collect();
        let table = Table::with_columns(columns, &records);
        let mut output = self.env.export_table(&self.base_name, &table, records).await?;
        output.metadata.insert("stopped".to_string(), stopped.into());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_article_record_cleans_html() {
        let category = SolutionCategory {
            id: 1,
            name: "Getting Started".to_string(),
        };
        let folder = SolutionFolder {
            id: 2,
            name: "Accounts".to_string(),
        };
        let article: SolutionArticle = serde_json::from_value(json!({
            "id": 300,
            "title": "Reset password",
            "description": "<p>Click <b>Forgot</b> &amp; follow the link.</p>",
            "created_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        let record = article_record(&category, &folder, &article);
        let keys: Vec<&str> = record.data.keys().map(String::as_str).collect();
        assert_eq!(keys, ARTICLE_COLUMNS.to_vec());
        assert_eq!(
            record.get("Description"),
            Some(&json!("Click Forgot & follow the link."))
        );
        assert_eq!(record.get("Updated At"), Some(&json!("")));
    }
}
