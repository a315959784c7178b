//! LLM error types with retry classification.
//!
//! Distinguishes between transient errors (retried with backoff) and permanent
//! errors (returned to the caller immediately).

use std::time::Duration;

/// Error from LLM API calls.
#[derive(Debug)]
pub struct LlmError {
    pub kind: LlmErrorKind,
    /// HTTP status code, if applicable
    pub status_code: Option<u16>,
    pub message: String,
    /// Suggested retry delay (from Retry-After header)
    pub retry_after: Option<Duration>,
}

impl LlmError {
    fn new(kind: LlmErrorKind, status_code: Option<u16>, message: String) -> Self {
        Self {
            kind,
            status_code,
            message,
            retry_after: None,
        }
    }

    /// Build an error from a failed HTTP exchange.
    ///
    /// Gemini reports a canonical status name (`RESOURCE_EXHAUSTED`,
    /// `UNAVAILABLE`, ...) in the error body; when present it takes precedence
    /// over the HTTP code.
    pub fn from_http(
        status_code: u16,
        status_name: Option<&str>,
        message: String,
        retry_after: Option<Duration>,
    ) -> Self {
        let kind = status_name
            .and_then(classify_status_name)
            .unwrap_or_else(|| classify_http_status(status_code));
        Self {
            kind,
            status_code: Some(status_code),
            message,
            retry_after: if kind == LlmErrorKind::RateLimited {
                retry_after
            } else {
                None
            },
        }
    }

    pub fn network_error(message: String) -> Self {
        Self::new(LlmErrorKind::NetworkError, None, message)
    }

    pub fn parse_error(message: String) -> Self {
        Self::new(LlmErrorKind::ParseError, None, message)
    }

    /// The prompt or the candidate was blocked (safety filters, recitation, ...).
    pub fn blocked(message: String) -> Self {
        Self::new(LlmErrorKind::Blocked, None, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// Get the suggested delay before retry.
    ///
    /// Returns `retry_after` if set, otherwise exponential backoff from a base
    /// that depends on the error kind, capped at 60 seconds.
    pub fn suggested_delay(&self, attempt: u32) -> Duration {
        if let Some(retry_after) = self.retry_after {
            return retry_after;
        }

        let base = match self.kind {
            LlmErrorKind::RateLimited => 4,
            LlmErrorKind::ServerError => 2,
            _ => 1,
        };

        let delay_secs = (base as u64).saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_secs(delay_secs.min(60))
    }
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for LlmError {}

/// Classification of LLM errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Quota or rate limit hit (429 / RESOURCE_EXHAUSTED)
    RateLimited,
    /// Upstream failure (5xx / UNAVAILABLE / INTERNAL)
    ServerError,
    /// Bad request, bad key, unknown model
    ClientError,
    /// Connection failed or timed out
    NetworkError,
    /// Response body did not match the expected shape
    ParseError,
    /// Prompt or response blocked by the provider
    Blocked,
}

impl LlmErrorKind {
    /// Check if this error kind is transient (should retry).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmErrorKind::RateLimited | LlmErrorKind::ServerError | LlmErrorKind::NetworkError
        )
    }
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LlmErrorKind::RateLimited => "Rate limited",
            LlmErrorKind::ServerError => "Server error",
            LlmErrorKind::ClientError => "Client error",
            LlmErrorKind::NetworkError => "Network error",
            LlmErrorKind::ParseError => "Parse error",
            LlmErrorKind::Blocked => "Blocked",
        };
        f.write_str(label)
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Maximum total time to spend retrying
    pub max_retry_duration: Duration,
    pub retry_rate_limits: bool,
    pub retry_server_errors: bool,
    pub retry_network_errors: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_retry_duration: Duration::from_secs(60),
            retry_rate_limits: true,
            retry_server_errors: true,
            retry_network_errors: true,
        }
    }
}

impl RetryConfig {
    /// A configuration that never retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Check if the given error should be retried based on this config.
    pub fn should_retry(&self, error: &LlmError) -> bool {
        if !error.is_transient() {
            return false;
        }
        match error.kind {
            LlmErrorKind::RateLimited => self.retry_rate_limits,
            LlmErrorKind::ServerError => self.retry_server_errors,
            LlmErrorKind::NetworkError => self.retry_network_errors,
            _ => false,
        }
    }
}

/// Parse HTTP status code into error kind.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        400..=499 => LlmErrorKind::ClientError,
        _ => LlmErrorKind::ServerError,
    }
}

/// Map a Google canonical status name to an error kind.
pub fn classify_status_name(name: &str) -> Option<LlmErrorKind> {
    match name {
        "RESOURCE_EXHAUSTED" => Some(LlmErrorKind::RateLimited),
        "UNAVAILABLE" | "INTERNAL" | "DEADLINE_EXCEEDED" => Some(LlmErrorKind::ServerError),
        "INVALID_ARGUMENT" | "FAILED_PRECONDITION" | "PERMISSION_DENIED" | "NOT_FOUND"
        | "UNAUTHENTICATED" => Some(LlmErrorKind::ClientError),
        _ => None,
    }
}
