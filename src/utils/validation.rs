//! 作業設定檔的欄位檢查，錯誤訊息一律帶上 TOML 欄位路徑（例如 `jobs.tag-vips.tags`）。

use crate::utils::error::{HelpdeskError, Result};
use std::collections::HashSet;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field: &str, value: impl ToString, reason: impl Into<String>) -> HelpdeskError {
    HelpdeskError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// 只接受 http / https
pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.trim().is_empty() {
        return Err(invalid(field_name, url_str, "URL cannot be empty"));
    }

    let url = Url::parse(url_str)
        .map_err(|e| invalid(field_name, url_str, format!("Invalid URL format: {}", e)))?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(()),
        "http" | "https" => Err(invalid(field_name, url_str, "URL has no host")),
        scheme => Err(invalid(
            field_name,
            url_str,
            format!("Unsupported URL scheme: {}", scheme),
        )),
    }
}

/// 網域只允許主機名稱，例如 `acme.freshdesk.com`
pub fn validate_domain(field_name: &str, domain: &str) -> Result<()> {
    validate_non_empty_string(field_name, domain)?;

    if domain.contains("://") || domain.contains('/') {
        return Err(invalid(
            field_name,
            domain,
            "Domain must be a bare host name without scheme or path",
        ));
    }

    validate_url(field_name, &format!("https://{}", domain.trim()))
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(invalid(field_name, path, "Path cannot be empty"));
    }
    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(
            field_name,
            value,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

/// 環境變數未展開時，`${VAR}` 會原樣留在設定值中
pub fn validate_no_placeholder(field_name: &str, value: &str) -> Result<()> {
    if value.contains("${") {
        // 不把原值放進錯誤訊息，避免半展開的金鑰出現在日誌
        return Err(invalid(
            field_name,
            "${...}",
            "Unresolved environment variable placeholder; export the variable before running",
        ));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(
            field_name,
            value,
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

/// `updated_since` 之類的時間參數需為 RFC 3339
pub fn validate_rfc3339(field_name: &str, value: &str) -> Result<()> {
    chrono::DateTime::parse_from_rfc3339(value.trim())
        .map(|_| ())
        .map_err(|e| invalid(field_name, value, format!("Expected an RFC 3339 timestamp: {}", e)))
}

/// 粗略檢查：一個 `@`，兩側皆非空，網域含 `.`
pub fn validate_email(field_name: &str, email: &str) -> Result<()> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.contains('@') && !email.contains(' ')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(invalid(field_name, email, "Not a valid email address"))
    }
}

/// 回傳第一個重複的名稱
pub fn validate_unique_names<'a>(
    field_name: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(HelpdeskError::ConfigValidationError {
                field: field_name.to_string(),
                message: format!("Duplicate name '{}'", name),
            });
        }
    }
    Ok(())
}
