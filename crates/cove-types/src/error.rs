use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Service-level error taxonomy.
///
/// Canonical definition lives here in cove-types so the storage layer, the
/// service layer and any embedding surface agree on one set of failure
/// shapes. Invariant violations are returned as values, never panics; batch
/// operations collect them per item instead of aborting.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", content = "detail", rename_all = "snake_case")]
pub enum CoreError {
    #[error("not authorized to perform this operation")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("already a member of this channel")]
    AlreadyMember,

    #[error("a pending invitation already exists for this target")]
    DuplicatePending,

    #[error("invitation is no longer pending")]
    InvalidTransition,

    #[error("invitation has expired")]
    Expired,

    #[error("a channel with members must keep at least one admin")]
    LastAdminViolation,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Static code string for log fields and per-target batch error lists.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::AlreadyMember => "already_member",
            Self::DuplicatePending => "duplicate_pending",
            Self::InvalidTransition => "invalid_transition",
            Self::Expired => "expired",
            Self::LastAdminViolation => "last_admin_violation",
            Self::Validation(_) => "validation_failed",
            Self::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(CoreError::DuplicatePending.error_code(), "duplicate_pending");
        assert_eq!(CoreError::LastAdminViolation.error_code(), "last_admin_violation");
        assert_eq!(
            CoreError::Validation("bad email".into()).error_code(),
            "validation_failed"
        );
    }
}
