//! 速率限制處理：`Retry-After` 解析、`X-RateLimit-*` 標頭快照與請求節流。

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// 沒有 `Retry-After` 標頭時的預設等待秒數
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

pub const RATE_LIMIT_TOTAL: &str = "x-ratelimit-total";
pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_USED: &str = "x-ratelimit-used-currentrequest";

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub default_retry_after: Duration,
    /// 429 之後最多重送幾次，超過即回傳 `RateLimited`
    pub max_rate_limit_retries: u32,
    pub server_error_retries: u32,
    pub server_error_backoff: Duration,
    pub low_remaining_threshold: Option<u32>,
    pub low_remaining_pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            default_retry_after: Duration::from_secs(DEFAULT_RETRY_AFTER_SECS),
            max_rate_limit_retries: 5,
            server_error_retries: 2,
            server_error_backoff: Duration::from_secs(5),
            low_remaining_threshold: None,
            low_remaining_pause: Duration::from_secs(10),
        }
    }
}

/// 解析 `Retry-After`：秒數或 HTTP-date；過去的時間點視為零
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    let delta = at.signed_duration_since(now);
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

pub fn retry_after_from_headers(
    headers: &HeaderMap,
    default: Duration,
    now: DateTime<Utc>,
) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_retry_after(v, now))
        .unwrap_or(default)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub total: Option<u32>,
    pub remaining: Option<u32>,
    pub used_current_request: Option<u32>,
}

impl RateLimitSnapshot {
    /// 回應不含任何速率標頭時回傳 `None`
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u32>().ok())
        };

        let snapshot = Self {
            total: read(RATE_LIMIT_TOTAL),
            remaining: read(RATE_LIMIT_REMAINING),
            used_current_request: read(RATE_LIMIT_USED),
        };

        if snapshot == Self::default() {
            None
        } else {
            Some(snapshot)
        }
    }

    pub fn is_low(&self, threshold: u32) -> bool {
        self.remaining.map(|r| r <= threshold).unwrap_or(false)
    }
}

/// 確保兩次請求之間至少間隔 `min_interval`
#[derive(Debug)]
pub struct RequestPacer {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub async fn pace(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }
}
