use thiserror::Error;

use crate::domain::demande::DemandeStatus;
use crate::domain::user::Role;

/// Workflow refusal and failure taxonomy. Every variant is surfaced to the
/// caller as a typed result; nothing in the transition path is swallowed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("caller identity could not be resolved")]
    Unauthenticated,
    #[error("role `{role}` may not perform `{action}` while status is `{status}`")]
    Forbidden { role: Role, action: String, status: DemandeStatus },
    #[error("demande `{0}` not found")]
    NotFound(String),
    #[error("modification window expired: {elapsed_minutes} minutes elapsed, limit is {limit_minutes}")]
    ExpiredWindow { elapsed_minutes: i64, limit_minutes: i64 },
    #[error("concurrent transition already advanced the demande past `{expected}`")]
    Conflict { expected: DemandeStatus },
    #[error("persistence failure: {0}")]
    Internal(String),
}

impl WorkflowError {
    /// Stable machine-readable code used by the HTTP layer and the audit
    /// trail.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::ExpiredWindow { .. } => "expired_window",
            Self::Conflict { .. } => "conflict",
            Self::Internal(_) => "internal",
        }
    }
}
