use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// 一筆扁平化的輸出資料列，欄位順序即插入順序
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub data: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.data.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketStatus {
    Open,
    Pending,
    Resolved,
    Closed,
    Unknown(i64),
}

impl TicketStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            2 => TicketStatus::Open,
            3 => TicketStatus::Pending,
            4 => TicketStatus::Resolved,
            5 => TicketStatus::Closed,
            other => TicketStatus::Unknown(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            TicketStatus::Open => 2,
            TicketStatus::Pending => 3,
            TicketStatus::Resolved => 4,
            TicketStatus::Closed => 5,
            TicketStatus::Unknown(code) => *code,
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketStatus::Open => write!(f, "Open"),
            TicketStatus::Pending => write!(f, "Pending"),
            TicketStatus::Resolved => write!(f, "Resolved"),
            TicketStatus::Closed => write!(f, "Closed"),
            TicketStatus::Unknown(code) => write!(f, "Unknown ({})", code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
    Unknown(i64),
}

impl TicketPriority {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => TicketPriority::Low,
            2 => TicketPriority::Medium,
            3 => TicketPriority::High,
            4 => TicketPriority::Urgent,
            other => TicketPriority::Unknown(other),
        }
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketPriority::Low => write!(f, "Low"),
            TicketPriority::Medium => write!(f, "Medium"),
            TicketPriority::High => write!(f, "High"),
            TicketPriority::Urgent => write!(f, "Urgent"),
            TicketPriority::Unknown(code) => write!(f, "Unknown ({})", code),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Ticket {
    pub id: u64,
    pub subject: Option<String>,
    pub status: i64,
    pub priority: i64,
    pub company_id: Option<u64>,
    pub requester_id: Option<u64>,
    pub responder_id: Option<u64>,
    pub group_id: Option<u64>,
    pub tags: Vec<String>,
    pub custom_fields: Map<String, Value>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Ticket {
    pub fn status(&self) -> TicketStatus {
        TicketStatus::from_code(self.status)
    }

    pub fn priority(&self) -> TicketPriority {
        TicketPriority::from_code(self.priority)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub id: u64,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_id: Option<u64>,
    pub active: bool,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Company {
    pub id: u64,
    pub name: Option<String>,
    pub domains: Vec<String>,
    pub custom_fields: Map<String, Value>,
}

impl Company {
    /// 讀取自訂欄位的字串值，空字串視為不存在
    pub fn custom_text(&self, field: &str) -> Option<&str> {
        self.custom_fields
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentContact {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub last_login_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Agent {
    pub id: u64,
    pub available: Option<bool>,
    pub occasional: bool,
    pub ticket_scope: Option<i64>,
    pub contact: AgentContact,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub last_active_at: Option<String>,
    pub active: Option<bool>,
    pub administrator: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaTarget {
    pub respond_within: Option<u64>,
    pub resolve_within: Option<u64>,
    pub business_hours: Option<bool>,
    pub escalation_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaPolicy {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub active: Option<bool>,
    pub position: Option<i64>,
    pub sla_target: Map<String, Value>,
    pub escalation: Option<Value>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl SlaPolicy {
    /// 依優先等級（priority_1 ...）取出目標設定，順序維持 API 回傳順序
    pub fn targets(&self) -> Vec<(String, SlaTarget)> {
        self.sla_target
            .iter()
            .map(|(priority, raw)| {
                let target = serde_json::from_value(raw.clone()).unwrap_or_default();
                (priority.clone(), target)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Conversation {
    pub id: u64,
    pub body: Option<String>,
    pub body_text: Option<String>,
    pub private: bool,
    pub incoming: bool,
    pub created_at: Option<String>,
}

/// 工單活動紀錄（`tickets/{id}/activities`）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketActivity {
    pub id: u64,
    pub ticket_id: Option<u64>,
    pub activity_type: Option<String>,
    pub description: Option<String>,
    pub performer_id: Option<u64>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SolutionCategory {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SolutionFolder {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SolutionArticle {
    pub id: u64,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<i64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}
