//! Wizard-level error taxonomy
//!
//! Five failure classes with distinct handling: configuration is fatal,
//! provider failures surface as a stream error event, parse failures
//! degrade to a partial plan, persistence failures are logged only, and
//! cancellation is silent.

use thiserror::Error;

use crate::llm::LlmError;

/// Errors surfaced by the orchestrator and wizard
#[derive(Debug, Error)]
pub enum PlanError {
    /// Missing or invalid credentials/settings; fatal, no retry
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Embedding or generation call failed; retryable
    #[error("provider error: {0}")]
    Provider(#[from] LlmError),

    /// Structured plan extraction failed
    #[error("plan extraction failed: {0}")]
    Parse(String),

    /// A save failed; non-fatal to the visible flow
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// User or system abort; not a failure
    #[error("generation cancelled")]
    Cancelled,

    /// Invalid operation for the current wizard step
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
}

impl PlanError {
    /// Whether re-submitting the same action may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            PlanError::Provider(e) => e.is_retryable(),
            PlanError::Persistence(_) => true,
            PlanError::Configuration(_) | PlanError::Parse(_) | PlanError::InvalidTransition(_) => false,
            PlanError::Cancelled => false,
        }
    }

    /// Cancellation is suppressed from every user-visible error surface
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, PlanError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_is_not_user_visible() {
        assert!(!PlanError::Cancelled.is_user_visible());
        assert!(PlanError::Parse("bad".to_string()).is_user_visible());
        assert!(PlanError::Persistence("disk full".to_string()).is_user_visible());
    }

    #[test]
    fn test_retryability() {
        assert!(!PlanError::Configuration("no key".to_string()).is_retryable());
        assert!(!PlanError::Cancelled.is_retryable());
        assert!(PlanError::Persistence("disk full".to_string()).is_retryable());
        assert!(PlanError::Provider(LlmError::Timeout(std::time::Duration::from_secs(5))).is_retryable());
    }
}
