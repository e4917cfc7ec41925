use crate::CoreError;
use serde::Serialize;

/// Per-invocation progress of a script's environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvState {
    Unclassified,
    NoDeps,
    PendingPip,
    PendingConda,
    /// The interpreter exists: reused, freshly created, or ambient.
    Resolved,
    /// The script has been handed to the interpreter.
    Ready,
}

impl std::fmt::Display for EnvState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvState::Unclassified => write!(f, "unclassified"),
            EnvState::NoDeps => write!(f, "no-deps"),
            EnvState::PendingPip => write!(f, "pending-pip"),
            EnvState::PendingConda => write!(f, "pending-conda"),
            EnvState::Resolved => write!(f, "resolved"),
            EnvState::Ready => write!(f, "ready"),
        }
    }
}

pub fn validate_transition(from: EnvState, to: EnvState) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (
            EnvState::Unclassified,
            EnvState::NoDeps | EnvState::PendingPip | EnvState::PendingConda
        ) | (
            EnvState::NoDeps | EnvState::PendingPip | EnvState::PendingConda,
            EnvState::Resolved
        ) | (EnvState::Resolved, EnvState::Ready)
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
