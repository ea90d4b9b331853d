//! 將 JSON 紀錄攤平成表格並輸出為 CSV / TSV / JSON / XLSX。

use crate::core::xlsx;
use crate::domain::model::Record;
use crate::domain::ports::Storage;
use crate::utils::error::{HelpdeskError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    Tsv,
    Json,
    Xlsx,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Csv,
        OutputFormat::Tsv,
        OutputFormat::Json,
        OutputFormat::Xlsx,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Json => "json",
            OutputFormat::Xlsx => "xlsx",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = HelpdeskError;

    fn from_str(s: &str) -> Result<Self> {
        OutputFormat::ALL
            .iter()
            .copied()
            .find(|f| f.extension().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| HelpdeskError::InvalidConfigValueError {
                field: "output.formats".to_string(),
                value: s.to_string(),
                reason: "Unsupported format. Valid formats: csv, tsv, json, xlsx".to_string(),
            })
    }
}

/// 巢狀物件展開為 `a.b` 形式的欄位，陣列保持原樣
pub fn flatten_record(value: &Value) -> Record {
    let mut record = Record::new();
    match value {
        Value::Object(obj) => flatten_into(&mut record.data, "", obj),
        other => {
            record.insert("value", other.clone());
        }
    }
    record
}

fn flatten_into(target: &mut Map<String, Value>, prefix: &str, obj: &Map<String, Value>) {
    for (key, value) in obj {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(target, &name, inner),
            other => {
                target.insert(name, other.clone());
            }
        }
    }
}

/// 表格儲存格的文字表示
pub fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) if items.iter().all(|v| !v.is_array() && !v.is_object()) => items
            .iter()
            .map(render_cell)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// 欄位為所有紀錄鍵的聯集，依第一次出現的順序排列
    pub fn from_records(records: &[Record]) -> Self {
        let mut headers: Vec<String> = Vec::new();
        for record in records {
            for key in record.data.keys() {
                if !headers.iter().any(|h| h == key) {
                    headers.push(key.clone());
                }
            }
        }
        Self::with_columns(headers, records)
    }

    /// 沒有任何紀錄時改用 `base_columns`，讓空的匯出仍有標題列
    pub fn from_records_or(records: &[Record], base_columns: &[&str]) -> Self {
        if records.is_empty() {
            Self::with_columns(base_columns.iter().map(|c| c.to_string()).collect(), records)
        } else {
            Self::from_records(records)
        }
    }

    pub fn with_columns(headers: Vec<String>, records: &[Record]) -> Self {
        let rows = records
            .iter()
            .map(|record| {
                headers
                    .iter()
                    .map(|h| record.data.get(h).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn to_delimited(&self, delimiter: u8) -> Result<Vec<u8>> {
        // 沒有欄位時輸出空檔案，csv 會把空紀錄寫成 `""`
        if self.headers.is_empty() {
            return Ok(Vec::new());
        }

        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(Vec::new());

        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(render_cell))?;
        }

        writer.into_inner().map_err(|e| HelpdeskError::IoError(e.into_error()))
    }

    pub fn to_csv(&self) -> Result<Vec<u8>> {
        self.to_delimited(b',')
    }

    pub fn to_tsv(&self) -> Result<Vec<u8>> {
        self.to_delimited(b'\t')
    }

    pub fn to_xlsx(&self, sheet_name: &str) -> Result<Vec<u8>> {
        xlsx::write_workbook(sheet_name, &self.headers, &self.rows)
    }
}

pub fn records_to_json(records: &[Record]) -> Result<Vec<u8>> {
    let values: Vec<&Map<String, Value>> = records.iter().map(|r| &r.data).collect();
    Ok(serde_json::to_vec_pretty(&values)?)
}

/// 依設定的格式把同一份資料寫成多個檔案
pub struct Exporter<'a, S: Storage> {
    storage: &'a S,
    formats: Vec<OutputFormat>,
    file_prefix: String,
}

impl<'a, S: Storage> Exporter<'a, S> {
    pub fn new(storage: &'a S, formats: Vec<OutputFormat>) -> Self {
        Self {
            storage,
            formats,
            file_prefix: String::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    pub fn file_name(&self, base_name: &str, format: OutputFormat) -> String {
        format!("{}{}.{}", self.file_prefix, base_name, format.extension())
    }

    /// 回傳已寫入檔案的完整位置
    pub async fn write_all(&self, base_name: &str, table: &Table, records: &[Record]) -> Result<Vec<String>> {
        let mut written = Vec::new();

        for format in &self.formats {
            let data = match format {
                OutputFormat::Csv => table.to_csv()?,
                OutputFormat::Tsv => table.to_tsv()?,
                OutputFormat::Json => records_to_json(records)?,
                OutputFormat::Xlsx => table.to_xlsx(base_name)?,
            };

            let file_name = self.file_name(base_name, *format);
            self.storage.write_file(&file_name, &data).await?;
            let location = self.storage.location(&file_name);
            tracing::info!("💾 Wrote {} rows to {}", table.len(), location);
            written.push(location);
        }

        Ok(written)
    }

    /// 寫出原始 JSON（例如 SLA 政策備份），不經過攤平
    pub async fn write_raw_json(&self, base_name: &str, value: &Value) -> Result<String> {
        let file_name = self.file_name(base_name, OutputFormat::Json);
        let data = serde_json::to_vec_pretty(value)?;
        self.storage.write_file(&file_name, &data).await?;
        Ok(self.storage.location(&file_name))
    }
}
