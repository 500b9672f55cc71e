//! # Release Errors
//!
//! Errors that callers branch on. Store plumbing failures travel as
//! `anyhow::Error` and are wrapped in [`ReleaseError::Internal`].

use thiserror::Error;

use crate::llm::LlmError;
use crate::pipeline::status::{Actor, ReleaseAction, ReleaseStatus};

/// Errors raised by release lifecycle and account operations
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// The action is not defined for the current status
    #[error("cannot {action} a release that is {from}")]
    InvalidTransition {
        from: ReleaseStatus,
        action: ReleaseAction,
    },

    /// The action exists but this actor may not trigger it
    #[error("{actor} may not {action} a release that is {from}")]
    Forbidden {
        from: ReleaseStatus,
        action: ReleaseAction,
        actor: Actor,
    },

    /// Someone else changed the release first
    #[error("release {id} was modified concurrently (expected version {expected})")]
    VersionConflict { id: String, expected: i64 },

    #[error("customer {customer_id} has no credits left")]
    InsufficientCredits { customer_id: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid input: {0}")]
    Validation(String),

    /// The model call behind a pipeline step failed
    #[error("language model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ReleaseError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<rusqlite::Error> for ReleaseError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Internal(e.into())
    }
}

pub type ReleaseResult<T> = Result<T, ReleaseError>;
