//! Oracle error taxonomy
//!
//! - transient: transport and format failures, retried with backoff
//! - invalid: well-formed but semantically wrong answers, retried at most once
//! - exhausted: the retry budget ran out; wraps the last cause

/// Oracle call failure
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// Network, HTTP status or timeout failure
    #[error("oracle transport failed: {0}")]
    Transport(String),

    /// Body is not JSON, or required keys are missing/mistyped
    #[error("malformed oracle response: {0}")]
    Format(String),

    /// Answer parsed but does not fit the request
    #[error("invalid oracle response: {0}")]
    Invalid(#[from] InvalidOracleResponse),

    /// Bounded retries used up
    #[error("oracle failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<OracleError>,
    },
}

impl OracleError {
    /// Transport and format failures are worth retrying
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Format(_))
    }

    #[inline]
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }

    /// Innermost cause, skipping retry wrappers
    #[must_use]
    pub fn root_cause(&self) -> &OracleError {
        match self {
            Self::RetriesExhausted { last, .. } => last.root_cause(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for OracleError {
    fn from(value: serde_json::Error) -> Self {
        Self::Format(value.to_string())
    }
}

/// Semantically invalid answer to a structural question
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidOracleResponse {
    /// Index outside `0..len`
    #[error("index {index} out of range for {len} candidates")]
    IndexOutOfRange { index: i64, len: usize },

    /// Every candidate was reported top-level, so no scope would shrink
    #[error("top-level set covers all {len} candidates")]
    SelfCoveringScope { len: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(OracleError::Transport("reset".into()).is_transient());
        assert!(OracleError::Format("no key".into()).is_transient());
        let invalid: OracleError = InvalidOracleResponse::SelfCoveringScope { len: 3 }.into();
        assert!(!invalid.is_transient());
        assert!(invalid.is_invalid());
    }

    #[test]
    fn root_cause_unwraps_exhaustion() {
        let err = OracleError::RetriesExhausted {
            attempts: 3,
            last: Box::new(OracleError::Transport("timeout".into())),
        };
        assert!(matches!(err.root_cause(), OracleError::Transport(_)));
        assert!(err.to_string().contains("after 3 attempts"));
    }

    #[test]
    fn json_errors_are_format_errors() {
        let err: OracleError = serde_json::from_str::<serde_json::Value>("nope")
            .unwrap_err()
            .into();
        assert!(matches!(err, OracleError::Format(_)));
    }
}
