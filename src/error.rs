//! Error taxonomy shared by every layer of the acquisition pipeline.
//!
//! Tool handlers never propagate a `PipelineError` past the handler boundary —
//! they convert it into a `McpCallResult` with `is_error: true` (see
//! `mcp::handlers::common::error_result`). Internal code uses `?` throughout.

use thiserror::Error;

/// The ten error kinds recognized by the pipeline. Distinct from `PipelineError`
/// so metrics and response builders can match on kind without destructuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Network,
    Timeout,
    Auth,
    Payment,
    RateLimit,
    Server,
    Content,
    Cache,
    Protocol,
}

impl ErrorKind {
    /// Whether a failure of this kind is worth retrying (possibly with a
    /// different strategy, or after `retry_after_ms`).
    pub fn retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Network | ErrorKind::RateLimit | ErrorKind::Server
        ) || self == ErrorKind::Timeout
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Auth => "auth",
            ErrorKind::Payment => "payment",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Server => "server",
            ErrorKind::Content => "content",
            ErrorKind::Cache => "cache",
            ErrorKind::Protocol => "protocol",
        }
    }

    /// Non-transient failures count toward the learned store's demotion
    /// threshold; transient ones (network/timeout/rate_limit/server) do not.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::RateLimit | ErrorKind::Server
        )
    }
}

#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("validation failed at {path}: {rule}")]
    Validation { path: String, rule: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("authentication required: {0}")]
    Auth(String),

    #[error("payment required: {0}")]
    Payment(String),

    #[error("rate limited: {0}")]
    RateLimit {
        message: String,
        retry_after_ms: Option<u64>,
    },

    #[error("upstream server error: {0}")]
    Server(String),

    #[error("content processing failed: {0}")]
    Content(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("protocol invariant violated: {0}")]
    Protocol(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Validation { .. } => ErrorKind::Validation,
            PipelineError::Network(_) => ErrorKind::Network,
            PipelineError::Timeout { .. } => ErrorKind::Timeout,
            PipelineError::Auth(_) => ErrorKind::Auth,
            PipelineError::Payment(_) => ErrorKind::Payment,
            PipelineError::RateLimit { .. } => ErrorKind::RateLimit,
            PipelineError::Server(_) => ErrorKind::Server,
            PipelineError::Content(_) => ErrorKind::Content,
            PipelineError::Cache(_) => ErrorKind::Cache,
            PipelineError::Protocol(_) => ErrorKind::Protocol,
        }
    }

    pub fn retryable(&self) -> bool {
        self.kind().retryable()
    }

    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            PipelineError::RateLimit { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }

    pub fn validation(path: impl Into<String>, rule: impl Into<String>) -> Self {
        PipelineError::Validation {
            path: path.into(),
            rule: rule.into(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds_are_retryable() {
        for kind in [ErrorKind::Network, ErrorKind::Timeout, ErrorKind::RateLimit, ErrorKind::Server] {
            assert!(kind.retryable());
            assert!(kind.is_transient());
        }
    }

    #[test]
    fn non_transient_kinds_are_not_retryable() {
        for kind in [ErrorKind::Validation, ErrorKind::Auth, ErrorKind::Payment, ErrorKind::Content, ErrorKind::Cache, ErrorKind::Protocol] {
            assert!(!kind.retryable());
            assert!(!kind.is_transient());
        }
    }

    #[test]
    fn validation_constructor_round_trips_path_and_rule() {
        let err = PipelineError::validation("url", "must not be empty");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("url"));
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn rate_limit_carries_retry_after() {
        let err = PipelineError::RateLimit {
            message: "slow down".to_string(),
            retry_after_ms: Some(2_000),
        };
        assert_eq!(err.retry_after_ms(), Some(2_000));
        assert!(err.retryable());
    }

    #[test]
    fn non_rate_limit_errors_have_no_retry_after() {
        let err = PipelineError::Network("connection reset".to_string());
        assert_eq!(err.retry_after_ms(), None);
    }
}
