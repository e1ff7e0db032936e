//! Error values shared across the surety crates.
//!
//! Two tiers exist. A [`DomainError`] is a deliberately constructed business
//! failure carrying a code, an optional message, and an optional cause chain.
//! A defect is a `DomainError` under the fixed [`DEFECT_CODE`], produced when
//! an async producer breaks its contract (panics instead of returning a
//! result); defects travel the same channel as domain errors so nothing
//! escapes as an unhandled failure.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Sentinel error code used when a broken async contract is wrapped into the
/// domain-error channel.
pub const DEFECT_CODE: &str = "defect";

/// Business-originated failure value.
///
/// The `code` is the stable, machine-readable identity of the failure; the
/// optional `message` is human-readable context; the optional `cause` keeps
/// the foreign error that was mapped into this one. Equality and
/// serialization cover code and message only; causes are diagnostic
/// payload, not identity.
#[derive(Clone, Serialize, Deserialize)]
pub struct DomainError {
    code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip)]
    cause: Option<Arc<anyhow::Error>>,
}

impl DomainError {
    /// Create a domain error with the given code.
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into();
        debug!(code = %code, "domain error constructed");
        Self {
            code,
            message: None,
            cause: None,
        }
    }

    /// Attach a human-readable message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach the foreign error this one was mapped from.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<anyhow::Error>) -> Self {
        self.cause = Some(Arc::new(cause.into()));
        self
    }

    /// Wrap a broken async contract under [`DEFECT_CODE`].
    pub fn defect(cause: impl Into<anyhow::Error>) -> Self {
        Self::new(DEFECT_CODE)
            .with_message("async producer broke its contract")
            .with_cause(cause)
    }

    /// Stable error code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Optional human-readable message.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Foreign error this one was mapped from, when present.
    pub fn cause(&self) -> Option<&anyhow::Error> {
        self.cause.as_deref()
    }

    /// Whether this error carries the defect sentinel code.
    pub fn is_defect(&self) -> bool {
        self.code == DEFECT_CODE
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.code, message),
            None => f.write_str(&self.code),
        }
    }
}

impl fmt::Debug for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainError")
            .field("code", &self.code)
            .field("message", &self.message)
            .field("cause", &self.cause.as_deref().map(|cause| cause.to_string()))
            .finish()
    }
}

impl PartialEq for DomainError {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code && self.message == other.message
    }
}

impl Eq for DomainError {}

impl std::error::Error for DomainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(AsRef::<dyn std::error::Error + 'static>::as_ref)
    }
}

impl From<&str> for DomainError {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for DomainError {
    fn from(code: String) -> Self {
        Self::new(code)
    }
}

/// Payload of the panic raised when unwrapping a non-success outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unwrapped an error outcome: {0}")]
pub struct UnwrapError(pub DomainError);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_message_when_present() {
        let bare = DomainError::new("billing/overdue");
        assert_eq!(bare.to_string(), "billing/overdue");

        let described = DomainError::new("billing/overdue").with_message("invoice 42 unpaid");
        assert_eq!(described.to_string(), "billing/overdue: invoice 42 unpaid");
    }

    #[test]
    fn equality_ignores_cause() {
        let plain = DomainError::new("io").with_message("read failed");
        let caused = DomainError::new("io")
            .with_message("read failed")
            .with_cause(std::io::Error::other("disk gone"));
        assert_eq!(plain, caused);
    }

    #[test]
    fn defect_carries_sentinel_code_and_cause() {
        let defect = DomainError::defect(anyhow::anyhow!("task panicked"));
        assert!(defect.is_defect());
        assert_eq!(defect.code(), DEFECT_CODE);
        assert!(defect.cause().is_some());
        assert!(std::error::Error::source(&defect).is_some());
    }

    #[test]
    fn serialization_skips_cause() {
        let caused = DomainError::new("io").with_cause(std::io::Error::other("disk gone"));
        let json = serde_json::to_value(&caused).expect("serialize");
        assert_eq!(json, serde_json::json!({ "code": "io" }));
    }
}
