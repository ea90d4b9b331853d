use thiserror::Error;

#[derive(Error, Debug)]
pub enum HelpdeskError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}: {body}")]
    HttpStatus {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Resource not found: {url}")]
    NotFound { url: String },

    #[error("Rate limit still exceeded after {attempts} attempts (last Retry-After: {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64, attempts: u32 },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Job '{job}' failed: {details}")]
    JobError { job: String, details: String },

    #[error("Operation cancelled: {message}")]
    Cancelled { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    RateLimit,
    Remote,
    Configuration,
    Data,
    Storage,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl HelpdeskError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            HelpdeskError::ApiError(_) => ErrorCategory::Network,
            HelpdeskError::RateLimited { .. } => ErrorCategory::RateLimit,
            HelpdeskError::HttpStatus { .. } | HelpdeskError::NotFound { .. } => {
                ErrorCategory::Remote
            }
            HelpdeskError::ConfigError { .. }
            | HelpdeskError::ConfigValidationError { .. }
            | HelpdeskError::MissingConfigError { .. }
            | HelpdeskError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            HelpdeskError::CsvError(_)
            | HelpdeskError::SerializationError(_)
            | HelpdeskError::ProcessingError { .. }
            | HelpdeskError::JobError { .. } => ErrorCategory::Data,
            HelpdeskError::ZipError(_) | HelpdeskError::IoError(_) => ErrorCategory::Storage,
            HelpdeskError::Cancelled { .. } => ErrorCategory::Cancelled,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Cancelled => ErrorSeverity::Low,
            ErrorCategory::Network | ErrorCategory::RateLimit => ErrorSeverity::Medium,
            ErrorCategory::Remote | ErrorCategory::Data | ErrorCategory::Configuration => {
                ErrorSeverity::High
            }
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    /// 是否值得在下一次執行時重試
    pub fn is_retryable(&self) -> bool {
        match self {
            HelpdeskError::ApiError(e) => e.is_timeout() || e.is_connect(),
            HelpdeskError::RateLimited { .. } => true,
            HelpdeskError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            HelpdeskError::HttpStatus { status, .. } => Some(*status),
            HelpdeskError::NotFound { .. } => Some(404),
            HelpdeskError::RateLimited { .. } => Some(429),
            HelpdeskError::ApiError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            HelpdeskError::ApiError(_) => {
                "Check network connectivity and that the helpdesk domain is reachable"
            }
            HelpdeskError::RateLimited { .. } => {
                "Lower request pacing in [rate_limit] or raise max_rate_limit_retries"
            }
            HelpdeskError::HttpStatus { status, .. } if *status == 401 || *status == 403 => {
                "Verify the API key and that the agent has permission for this endpoint"
            }
            HelpdeskError::HttpStatus { status, .. } if *status >= 500 => {
                "The helpdesk service reported an internal error; try again later"
            }
            HelpdeskError::HttpStatus { .. } => "Inspect the response body for field-level errors",
            HelpdeskError::NotFound { .. } => "Confirm the record identifiers exist in this tenant",
            HelpdeskError::ConfigError { .. }
            | HelpdeskError::ConfigValidationError { .. }
            | HelpdeskError::MissingConfigError { .. }
            | HelpdeskError::InvalidConfigValueError { .. } => {
                "Fix the job file and run with --dry-run to check it"
            }
            HelpdeskError::IoError(_) | HelpdeskError::ZipError(_) => {
                "Check that the output directory exists and is writable"
            }
            HelpdeskError::CsvError(_) | HelpdeskError::SerializationError(_) => {
                "The API returned data that could not be encoded; rerun with --verbose"
            }
            HelpdeskError::ProcessingError { .. } | HelpdeskError::JobError { .. } => {
                "Rerun with --verbose to see per-record details"
            }
            HelpdeskError::Cancelled { .. } => "Rerun the job to process the remaining records",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not reach the helpdesk API ({})", self),
            ErrorCategory::RateLimit => format!("The helpdesk API kept rate limiting us: {}", self),
            ErrorCategory::Remote => format!("The helpdesk API rejected a request: {}", self),
            ErrorCategory::Configuration => format!("Job file problem: {}", self),
            ErrorCategory::Data => format!("Processing failed: {}", self),
            ErrorCategory::Storage => format!("Could not write output: {}", self),
            ErrorCategory::Cancelled => format!("Stopped before completion: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, HelpdeskError>;
