use super::{ApiRequest, HelpdeskClient};
use crate::utils::error::{HelpdeskError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// API 允許的單頁上限
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone)]
pub struct PageOptions {
    pub per_page: u32,
    pub max_pages: Option<u32>,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            per_page: MAX_PER_PAGE,
            max_pages: None,
        }
    }
}

impl PageOptions {
    pub fn per_page(per_page: u32) -> Self {
        Self {
            per_page,
            ..Self::default()
        }
    }

    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }
}

/// 分頁抓取的結果；中途失敗時保留已取得的資料與中斷原因
#[derive(Debug, Default)]
pub struct PaginatedFetch {
    pub items: Vec<Value>,
    pub pages_fetched: u32,
    pub interruption: Option<HelpdeskError>,
}

impl PaginatedFetch {
    pub fn is_complete(&self) -> bool {
        self.interruption.is_none()
    }

    /// 需要完整資料時使用：有中斷就回傳錯誤
    pub fn into_complete(self) -> Result<Vec<Value>> {
        match self.interruption {
            Some(err) => Err(err),
            None => Ok(self.items),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.items
            .iter()
            .map(|item| serde_json::from_value(item.clone()).map_err(HelpdeskError::from))
            .collect()
    }
}

fn page_items(body: Value) -> Result<Option<Vec<Value>>> {
    match body {
        Value::Array(items) => Ok(Some(items)),
        Value::Null => Ok(None),
        other => Err(HelpdeskError::ProcessingError {
            message: format!(
                "Expected a JSON array page, got {}",
                match other {
                    Value::Object(_) => "an object",
                    Value::String(_) => "a string",
                    Value::Number(_) => "a number",
                    _ => "a scalar",
                }
            ),
        }),
    }
}

impl HelpdeskClient {
    /// 以 `page`/`per_page` 逐頁 GET，直到遇到空頁為止。
    ///
    /// 429 會在 [`HelpdeskClient::send`] 內等待並重送同一頁，頁碼不會前進。
    /// 其他錯誤會中止迴圈，已累積的資料仍會回傳。
    pub async fn get_paginated(
        &self,
        path: &str,
        query: &[(String, String)],
        options: &PageOptions,
    ) -> PaginatedFetch {
        let mut fetch = PaginatedFetch::default();
        let mut page: u32 = 1;

        loop {
            if let Some(max_pages) = options.max_pages {
                if page > max_pages {
                    tracing::info!("📄 {}: reached max_pages ({})", path, max_pages);
                    break;
                }
            }

            let request = ApiRequest::get(path)
                .with_query_pairs(query)
                .with_query("page", page)
                .with_query("per_page", options.per_page);

            let body = match self.send(&request).await {
                Ok(response) => response.body,
                Err(e) => {
                    tracing::error!("❌ {}: failed to fetch page {}: {}", path, page, e);
                    fetch.interruption = Some(e);
                    break;
                }
            };

            match page_items(body) {
                Ok(Some(items)) if !items.is_empty() => {
                    tracing::info!("📄 {}: page {} ({} items)", path, page, items.len());
                    fetch.items.extend(items);
                    fetch.pages_fetched += 1;
                    page += 1;
                }
                Ok(_) => {
                    tracing::debug!("📄 {}: empty page {}, done", path, page);
                    break;
                }
                Err(e) => {
                    tracing::error!("❌ {}: unexpected page {} body: {}", path, page, e);
                    fetch.interruption = Some(e);
                    break;
                }
            }
        }

        tracing::info!(
            "📥 {}: {} items across {} pages",
            path,
            fetch.items.len(),
            fetch.pages_fetched
        );
        fetch
    }
}
