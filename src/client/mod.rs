//! 共用的 helpdesk REST 客戶端。
//!
//! 所有作業都經由 [`HelpdeskClient::send`] 發出請求，統一處理 Basic 驗證
//! （API key 為帳號、密碼固定為 `X`）、請求節流、429 等待重送與 5xx 退避。

pub mod pagination;
pub mod rate_limit;

pub use pagination::{PageOptions, PaginatedFetch};
pub use rate_limit::{RateLimitSnapshot, RequestPacer, RetryPolicy};

use crate::utils::error::{HelpdeskError, Result};
use chrono::Utc;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;

/// 建立客戶端所需的連線設定
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// 例如 `https://acme.freshdesk.com/api/v2`
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub min_request_interval: Duration,
    pub policy: RetryPolicy,
}

impl ClientSettings {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
            user_agent: None,
            min_request_interval: Duration::ZERO,
            policy: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_query_pairs(mut self, pairs: &[(String, String)]) -> Self {
        self.query.extend(pairs.iter().cloned());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn is_write(&self) -> bool {
        self.method != Method::GET && self.method != Method::HEAD
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

pub struct HelpdeskClient {
    http: Client,
    base_url: String,
    api_key: String,
    policy: RetryPolicy,
    pacer: RequestPacer,
    last_rate_limit: Mutex<Option<RateLimitSnapshot>>,
}

impl HelpdeskClient {
    pub fn new(settings: ClientSettings) -> Result<Self> {
        let mut builder = Client::builder().timeout(settings.timeout);
        if let Some(agent) = &settings.user_agent {
            builder = builder.user_agent(agent.clone());
        }

        Ok(Self {
            http: builder.build()?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key,
            policy: settings.policy,
            pacer: RequestPacer::new(settings.min_request_interval),
            last_rate_limit: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 相對路徑接在 base URL 之後；完整 URL 原樣使用
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    pub fn last_rate_limit(&self) -> Option<RateLimitSnapshot> {
        self.last_rate_limit.lock().ok().and_then(|guard| *guard)
    }

    fn record_rate_limit(&self, snapshot: Option<RateLimitSnapshot>) {
        if let Some(snapshot) = snapshot {
            tracing::debug!(
                "⏱️ Rate limit: {:?}/{:?} remaining",
                snapshot.remaining,
                snapshot.total
            );
            if let Ok(mut guard) = self.last_rate_limit.lock() {
                *guard = Some(snapshot);
            }
        }
    }

    async fn pause_if_running_low(&self) {
        let Some(threshold) = self.policy.low_remaining_threshold else {
            return;
        };

        if let Some(snapshot) = self.last_rate_limit() {
            if snapshot.is_low(threshold) {
                tracing::warn!(
                    "⏳ Only {:?} API calls left in this window, pausing {:?}",
                    snapshot.remaining,
                    self.policy.low_remaining_pause
                );
                tokio::time::sleep(self.policy.low_remaining_pause).await;
                if let Ok(mut guard) = self.last_rate_limit.lock() {
                    *guard = None;
                }
            }
        }
    }

    /// 發出請求；429 依 `Retry-After` 等待後原樣重送，5xx 固定退避重試
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = self.url_for(&request.path);
        let mut rate_limit_attempts = 0u32;
        let mut server_error_attempts = 0u32;

        loop {
            self.pause_if_running_low().await;
            self.pacer.pace().await;

            let mut builder = self
                .http
                .request(request.method.clone(), &url)
                .basic_auth(&self.api_key, Some("X"));
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            tracing::debug!("📡 {} {} {:?}", request.method, url, request.query);
            let response = builder.send().await?;
            let status = response.status();
            tracing::debug!("📡 {} {} -> {}", request.method, url, status);

            self.record_rate_limit(RateLimitSnapshot::from_headers(response.headers()));

            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait = rate_limit::retry_after_from_headers(
                    response.headers(),
                    self.policy.default_retry_after,
                    Utc::now(),
                );
                rate_limit_attempts += 1;

                if rate_limit_attempts > self.policy.max_rate_limit_retries {
                    return Err(HelpdeskError::RateLimited {
                        retry_after_secs: wait.as_secs(),
                        attempts: rate_limit_attempts,
                    });
                }

                tracing::warn!(
                    "⏳ Rate limit exceeded for {} {}. Waiting {:?} before retry {}/{}",
                    request.method,
                    url,
                    wait,
                    rate_limit_attempts,
                    self.policy.max_rate_limit_retries
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if status.is_server_error() && server_error_attempts < self.policy.server_error_retries {
                server_error_attempts += 1;
                tracing::warn!(
                    "🔁 {} {} returned {}. Retrying in {:?} ({}/{})",
                    request.method,
                    url,
                    status,
                    self.policy.server_error_backoff,
                    server_error_attempts,
                    self.policy.server_error_retries
                );
                tokio::time::sleep(self.policy.server_error_backoff).await;
                continue;
            }

            if status == StatusCode::NOT_FOUND {
                return Err(HelpdeskError::NotFound { url });
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(HelpdeskError::HttpStatus {
                    status: status.as_u16(),
                    url,
                    body,
                });
            }

            let bytes = response.bytes().await?;
            let body = if bytes.iter().all(|b| b.is_ascii_whitespace()) {
                Value::Null
            } else {
                serde_json::from_slice(&bytes)?
            };

            return Ok(ApiResponse {
                status: status.as_u16(),
                body,
            });
        }
    }

    pub async fn get_json(&self, path: &str, query: &[(String, String)]) -> Result<Value> {
        let request = ApiRequest::get(path).with_query_pairs(query);
        Ok(self.send(&request).await?.body)
    }

    pub async fn get_as<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T> {
        let body = self.get_json(path, query).await?;
        Ok(serde_json::from_value(body)?)
    }

    pub async fn put_with_retry(&self, path: &str, payload: Value) -> Result<Value> {
        Ok(self.send(&ApiRequest::put(path, payload)).await?.body)
    }

    pub async fn post_json(&self, path: &str, payload: Value) -> Result<Value> {
        Ok(self.send(&ApiRequest::post(path, payload)).await?.body)
    }

    pub async fn delete(&self, path: &str, query: &[(String, String)]) -> Result<u16> {
        let request = ApiRequest::delete(path).with_query_pairs(query);
        Ok(self.send(&request).await?.status)
    }
}
