//! Error taxonomy for transclusion resolution.
//!
//! The resolver never returns `Err` to its caller: every failure path
//! terminates in a [`TransclusionResult::Error`] value carrying one of
//! these kinds, so the rendering layer can show a short message per kind
//! and decide whether a retry affordance makes sense.
//!
//! [`TransclusionResult::Error`]: crate::resolve::TransclusionResult

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What went wrong while resolving a transclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransclusionErrorKind {
    /// The link target source could not be located.
    FileNotFound,
    /// A cycle was detected, or the chain exceeded the depth limit.
    CircularReference,
    /// The source loaded, but the search option matched nothing in it.
    InvalidTarget,
    /// Reserved for source-access failures raised by storage collaborators.
    PermissionDenied,
    /// Text parsing failed, or an unexpected failure during resolution.
    ParseError,
}

impl TransclusionErrorKind {
    /// Whether retrying the resolution could plausibly change the outcome.
    /// Cycles and depth overruns are terminal: rerunning them yields the
    /// identical result.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransclusionErrorKind::CircularReference)
    }
}

impl std::fmt::Display for TransclusionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransclusionErrorKind::FileNotFound => "file not found",
            TransclusionErrorKind::CircularReference => "circular reference",
            TransclusionErrorKind::InvalidTarget => "invalid target",
            TransclusionErrorKind::PermissionDenied => "permission denied",
            TransclusionErrorKind::ParseError => "parse error",
        };
        f.write_str(name)
    }
}

/// Typed failure used inside the resolution pipeline before it is folded
/// into a result value.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransclusionError {
    pub kind: TransclusionErrorKind,
    pub message: String,
}

impl TransclusionError {
    pub fn new(kind: TransclusionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability() {
        assert!(!TransclusionErrorKind::CircularReference.is_retryable());
        assert!(TransclusionErrorKind::ParseError.is_retryable());
        assert!(TransclusionErrorKind::FileNotFound.is_retryable());
    }

    #[test]
    fn test_error_display_carries_message() {
        let err = TransclusionError::new(TransclusionErrorKind::ParseError, "bad input");
        assert_eq!(err.to_string(), "bad input");
    }
}
