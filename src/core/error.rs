// src/core/error.rs

use crate::core::models::Review;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the provider layer, the scan context, the scanners and the orchestrator.
///
/// Everything in here propagates by return value to the caller of a review; predicate
/// failures have their own type ([`RuleError`]) and never show up here.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unable to acquire credentials: {0}")]
    Credential(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("throttled by provider (retry after {retry_after:?})")]
    Throttled { retry_after: Option<Duration> },

    #[error("unable to decode provider payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Resource Group {0} does not exist")]
    ResourceGroupNotFound(String),

    #[error("failed to build scan context for subscription {subscription_id}: {source}")]
    ScanContext {
        subscription_id: String,
        #[source]
        source: Box<ScanError>,
    },

    #[error("{scanner} scanner failed: {source}")]
    Scanner {
        scanner: String,
        #[source]
        source: Box<ScanError>,
    },

    #[error("{scanner} scanner task panicked: {message}")]
    TaskPanicked { scanner: String, message: String },

    #[error("scan was cancelled")]
    Cancelled,

    #[error("scan deadline exceeded")]
    DeadlineExceeded,

    /// A resource-group run failed; `partial` holds what the review collected before it.
    #[error("scan of Resource Group {resource_group} aborted: {source}")]
    Aborted {
        resource_group: String,
        partial: Box<Review>,
        #[source]
        source: Box<ScanError>,
    },

    #[error("{0}")]
    Other(String),
}

impl ScanError {
    /// Wraps an error with the name of the scanner that produced it.
    pub fn in_scanner(self, scanner: &str) -> Self {
        match self {
            // Already attributed, or not attributable to a single scanner.
            e @ (ScanError::Scanner { .. } | ScanError::Cancelled | ScanError::DeadlineExceeded) => e,
            e => ScanError::Scanner {
                scanner: scanner.to_string(),
                source: Box::new(e),
            },
        }
    }

    /// Returns the innermost error, skipping scanner attribution wrappers.
    pub fn root(&self) -> &ScanError {
        match self {
            ScanError::Scanner { source, .. } | ScanError::ScanContext { source, .. } => source.root(),
            e => e,
        }
    }

    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ScanError::Throttled { .. } => true,
            ScanError::Api { status, .. } => *status == 408 || (500..=599).contains(status),
            ScanError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

/// Why a single recommendation could not be evaluated against a resource.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("{0} was not collected (enable detailed scan)")]
    NotCollected(&'static str),

    #[error("invalid value: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanner_attribution_is_applied_once() {
        let err = ScanError::Other("throttled".into())
            .in_scanner("cr")
            .in_scanner("orchestrator");
        assert_eq!(err.to_string(), "cr scanner failed: throttled");
        assert_eq!(err.root().to_string(), "throttled");
    }

    #[test]
    fn cancellation_is_not_attributed() {
        let err = ScanError::Cancelled.in_scanner("aks");
        assert!(matches!(err, ScanError::Cancelled));
    }

    #[test]
    fn transient_statuses() {
        assert!(ScanError::Api { status: 503, message: String::new() }.is_transient());
        assert!(ScanError::Throttled { retry_after: None }.is_transient());
        assert!(!ScanError::Api { status: 403, message: String::new() }.is_transient());
        assert!(!ScanError::ResourceGroupNotFound("rg".into()).is_transient());
    }
}
