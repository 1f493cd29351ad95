use thiserror::Error;

use crate::sim::AgentHandle;

/// Errors raised while configuring a simulation.
///
/// Per-tick work never fails; only setup and configuration calls return these.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimError {
    /// A configuration value that cannot be used (negative speed, inverted volume, ...).
    #[error("invalid configuration for `{field}`: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },
    /// The handle was removed or never belonged to this world.
    #[error("unknown agent handle {0:?}")]
    UnknownAgent(AgentHandle),
    #[error("unknown scenario id '{0}'")]
    UnknownScenario(String),
}

pub type SimResult<T> = Result<T, SimError>;

/// Reject values that are not finite and strictly positive.
pub(crate) fn ensure_positive(field: &'static str, value: f64) -> SimResult<()> {
    if !value.is_finite() {
        return Err(SimError::InvalidConfig { field, reason: "must be finite" });
    }
    if value <= 0.0 {
        return Err(SimError::InvalidConfig { field, reason: "must be positive" });
    }
    Ok(())
}

/// Reject values that are not finite or below zero.
pub(crate) fn ensure_non_negative(field: &'static str, value: f64) -> SimResult<()> {
    if !value.is_finite() {
        return Err(SimError::InvalidConfig { field, reason: "must be finite" });
    }
    if value < 0.0 {
        return Err(SimError::InvalidConfig { field, reason: "must not be negative" });
    }
    Ok(())
}
