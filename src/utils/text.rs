use regex::Regex;
use std::sync::OnceLock;

fn tag_pattern() -> &'static Regex {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"<[^>]+>").expect("static tag pattern"))
}

/// 移除 HTML 標籤並解碼實體，知識庫文章描述匯出時使用
pub fn clean_html(raw_html: &str) -> String {
    let stripped = tag_pattern().replace_all(raw_html, "");
    html_escape::decode_html_entities(&stripped).trim().to_string()
}

/// 將秒數轉為 `2h 30m` / `45m` / `30s`；一小時以上不顯示秒
pub fn format_duration_secs(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let remaining = seconds % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if remaining > 0 && hours == 0 {
        parts.push(format!("{}s", remaining));
    }

    if parts.is_empty() {
        "0s".to_string()
    } else {
        parts.join(" ")
    }
}

/// 解析以空白、逗號或換行分隔的數字 ID 清單
pub fn parse_id_list(input: &str) -> Result<Vec<u64>, String> {
    input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<u64>()
                .map_err(|_| format!("'{}' is not a numeric id", token))
        })
        .collect()
}
