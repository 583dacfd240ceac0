//! Error Taxonomy
//!
//! [`ConfigurationError`] is fatal and raised before any measurement starts.
//! [`PipelineError`] fails a single (case, parameter) pipeline; the run
//! carries on with the next one.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Measurement phase a pipeline can time out in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Repetition-count calibration
    Pilot,
    /// Steady-state detection
    Warmup,
    /// Fixed measured batches
    Measurement,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Pilot => write!(f, "pilot"),
            Phase::Warmup => write!(f, "warmup"),
            Phase::Measurement => write!(f, "measurement"),
        }
    }
}

/// Registry or settings rejected before measurement
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Nothing to run
    #[error("no benchmark cases registered")]
    EmptyRegistry,

    /// Two groups share a name
    #[error("parameter group '{0}' is registered more than once")]
    DuplicateGroup(String),

    /// Group without cases
    #[error("parameter group '{0}' has no benchmark cases")]
    EmptyGroup(String),

    /// Parameter source yielded nothing
    #[error("parameter group '{0}' produced no parameter values")]
    EmptyParameterGroup(String),

    #[error("case '{case}' appears more than once in group '{group}'")]
    #[allow(missing_docs)]
    DuplicateCase { group: String, case: String },

    #[error("group '{group}' marks more than one baseline: {cases:?}")]
    #[allow(missing_docs)]
    DuplicateBaseline { group: String, cases: Vec<String> },

    #[error("malformed case in group '{group}': {reason}")]
    #[allow(missing_docs)]
    MalformedCase { group: String, reason: String },

    #[error("invalid setting `{name}`: {reason}")]
    #[allow(missing_docs)]
    InvalidSetting { name: &'static str, reason: String },
}

impl ConfigurationError {
    /// Shorthand for [`ConfigurationError::InvalidSetting`]
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ConfigurationError::InvalidSetting {
            name,
            reason: reason.into(),
        }
    }
}

/// Failure of one pipeline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Clock cannot time anything reliably
    #[error("clock resolution unusable: {0}")]
    ClockResolution(String),

    #[error("{phase} phase exceeded its {budget:?} budget")]
    #[allow(missing_docs)]
    Timeout { phase: Phase, budget: Duration },

    /// Routine or hook panicked
    #[error("benchmark panicked: {0}")]
    Panicked(String),

    #[error("not enough samples: got {got}, need at least {min}")]
    #[allow(missing_docs)]
    InsufficientSamples { got: usize, min: usize },

    /// Statistics could not be computed for another reason
    #[error("statistics failed: {0}")]
    Statistics(String),
}

impl PipelineError {
    /// Short machine-readable failure code
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::ClockResolution(_) => "clock_resolution",
            PipelineError::Timeout { .. } => "timeout",
            PipelineError::Panicked(_) => "panic",
            PipelineError::InsufficientSamples { .. } => "insufficient_samples",
            PipelineError::Statistics(_) => "statistics",
        }
    }

    /// Phase that timed out, if this is a timeout
    pub fn timed_out_phase(&self) -> Option<Phase> {
        match self {
            PipelineError::Timeout { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

/// Extract a readable message from a `catch_unwind` payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_phase() {
        let err = PipelineError::Timeout {
            phase: Phase::Warmup,
            budget: Duration::from_millis(1),
        };
        assert_eq!(err.to_string(), "warmup phase exceeded its 1ms budget");
        assert_eq!(err.code(), "timeout");
        assert_eq!(err.timed_out_phase(), Some(Phase::Warmup));
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload = std::panic::catch_unwind(|| panic!("boom {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom 7");

        let payload = std::panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");
    }
}
