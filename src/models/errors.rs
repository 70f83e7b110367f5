//! Centralized Error Handling Module
//!
//! CEO Directive: Setiap kegagalan harus punya kode error yang unik,
//! supaya gap pada hasil trace mudah dilacak dari log production.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - SRC_xxx: transfer source errors (per-address gaps)
//! - PRICE_xxx: price resolution errors (unresolved values)
//! - PROVIDER_xxx: risk signal provider errors (missing signals)
//! - PARSE_xxx: malformed upstream records
//! - CFG_xxx: configuration errors (the only fatal class)

use std::fmt;

/// Application-wide error type
/// CEO Directive: All errors must flow through this type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Transfer Source Errors (per-address gaps)
    // ============================================
    /// Source endpoint unreachable or returned a server error
    SourceUnavailable,
    /// Source rate limited the request
    SourceRateLimited,
    /// Source request timeout
    SourceTimeout,
    /// Source returned a response that failed to parse
    SourceInvalidResponse,

    // ============================================
    // Price Resolution Errors
    // ============================================
    /// Price backend outage; value stays unresolved
    PriceUnavailable,

    // ============================================
    // Risk Signal Provider Errors
    // ============================================
    /// Provider unreachable or returned a server error
    ProviderUnavailable,
    /// Provider exceeded its probe timeout
    ProviderTimeout,
    /// Provider response failed to parse
    ProviderInvalidResponse,

    // ============================================
    // Record Errors
    // ============================================
    /// Upstream record that does not fit the data model
    MalformedRecord,

    // ============================================
    // Configuration Errors (fatal)
    // ============================================
    /// Seed address missing or unparseable
    ConfigInvalidSeed,
    /// Invalid configuration value (negative floor, NaN, ...)
    ConfigInvalidValue,
    /// Score thresholds not total-ordered / overlapping
    ConfigInvalidThresholds,
    /// Missing API key for a selected networked adapter
    ConfigMissingApiKey,

    // ============================================
    // Generic Errors
    // ============================================
    /// Filesystem error while writing outputs
    Io,
    /// Unknown error
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            // Transfer source
            Self::SourceUnavailable => "SRC_UNAVAILABLE",
            Self::SourceRateLimited => "SRC_RATE_LIMITED",
            Self::SourceTimeout => "SRC_TIMEOUT",
            Self::SourceInvalidResponse => "SRC_INVALID_RESPONSE",

            // Price resolution
            Self::PriceUnavailable => "PRICE_UNAVAILABLE",

            // Signal providers
            Self::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            Self::ProviderTimeout => "PROVIDER_TIMEOUT",
            Self::ProviderInvalidResponse => "PROVIDER_INVALID_RESPONSE",

            // Records
            Self::MalformedRecord => "PARSE_MALFORMED_RECORD",

            // Configuration
            Self::ConfigInvalidSeed => "CFG_INVALID_SEED",
            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",
            Self::ConfigInvalidThresholds => "CFG_INVALID_THRESHOLDS",
            Self::ConfigMissingApiKey => "CFG_MISSING_API_KEY",

            // Generic
            Self::Io => "IO_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Check if error is retryable (transient upstream conditions)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable
                | Self::SourceRateLimited
                | Self::SourceTimeout
                | Self::PriceUnavailable
                | Self::ProviderUnavailable
                | Self::ProviderTimeout
        )
    }

    /// Check if error is fatal (stops the run before any work)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigInvalidSeed
                | Self::ConfigInvalidValue
                | Self::ConfigInvalidThresholds
                | Self::ConfigMissingApiKey
        )
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    /// Transfer source unreachable
    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SourceUnavailable, msg)
    }

    /// Transfer source rate limited
    pub fn source_rate_limited(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SourceRateLimited, msg)
    }

    /// Transfer source timeout
    pub fn source_timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SourceTimeout, msg)
    }

    /// Transfer source returned garbage
    pub fn source_invalid_response(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SourceInvalidResponse, msg)
    }

    /// Price backend outage
    pub fn price_unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::PriceUnavailable, msg)
    }

    /// Risk signal provider outage
    pub fn provider_unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProviderUnavailable, msg)
    }

    /// Risk signal provider response failed to parse
    pub fn provider_invalid_response(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProviderInvalidResponse, msg)
    }

    /// Record that does not fit the data model
    pub fn malformed_record(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::MalformedRecord, msg)
    }

    /// Seed address missing or unparseable
    pub fn invalid_seed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalidSeed, msg)
    }

    /// Bad configuration value
    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalidValue, msg)
    }

    /// Score thresholds overlap or are out of order
    pub fn invalid_thresholds(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalidThresholds, msg)
    }

    /// Missing API key
    pub fn missing_api_key(key_name: &str) -> Self {
        Self::new(
            ErrorCode::ConfigMissingApiKey,
            format!("Missing API key: {}", key_name),
        )
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<eyre::Report> for AppError {
    fn from(err: eyre::Report) -> Self {
        Self::new(ErrorCode::Unknown, err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorCode::Io, "IO error", err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::SourceTimeout, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorCode::SourceUnavailable, "Connection failed")
        } else {
            Self::new(ErrorCode::Unknown, err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::SourceInvalidResponse, "JSON parse error", err)
    }
}
