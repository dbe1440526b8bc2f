//! Recut Error Definitions
//!
//! Defines error types used throughout the crate.

use std::time::Duration;

use thiserror::Error;

use super::edit::PlanIssue;
use super::recomposition::RecompositionStatus;
use super::{CompositionId, GenerationId, RecompositionId, RenderJobId};

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Edit Plan Errors
    // =========================================================================
    #[error("Edit plan rejected with {} issue(s): {}", issues.len(), summarize(issues))]
    PlanRejected { issues: Vec<PlanIssue> },

    #[error("Edit planning failed: {0}")]
    PlanningFailed(String),

    // =========================================================================
    // Lookup Errors
    // =========================================================================
    #[error("Generation not found: {0}")]
    GenerationNotFound(GenerationId),

    #[error("Composition not found: {0}")]
    CompositionNotFound(CompositionId),

    #[error("Recomposition not found: {0}")]
    RecompositionNotFound(RecompositionId),

    #[error("No recomposition tracks rendering job: {0}")]
    RenderJobNotFound(RenderJobId),

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    #[error("Invalid status transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: RecompositionId,
        from: RecompositionStatus,
        to: RecompositionStatus,
    },

    #[error("Recomposition {0} has no rollback snapshot")]
    RollbackUnavailable(RecompositionId),

    #[error("Trigger failed for recomposition {recomposition_id}: {source}")]
    Trigger {
        recomposition_id: RecompositionId,
        #[source]
        source: TriggerError,
    },

    #[error("Record store full: {0}")]
    StoreFull(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Returns the plan issues carried by a rejection, if any
    pub fn plan_issues(&self) -> Option<&[PlanIssue]> {
        match self {
            CoreError::PlanRejected { issues } => Some(issues),
            _ => None,
        }
    }
}

fn summarize(issues: &[PlanIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// Trigger Errors
// =============================================================================

/// Failure submitting a recomposition to the rendering backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TriggerError {
    #[error("network error: {0}")]
    Network(String),

    #[error("backend did not answer within {0:?}")]
    Timeout(Duration),

    #[error("backend rejected submission ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid backend response: {0}")]
    InvalidResponse(String),
}

impl TriggerError {
    /// Whether a caller-side retry could reasonably succeed
    pub fn is_transient(&self) -> bool {
        match self {
            TriggerError::Network(_) | TriggerError::Timeout(_) => true,
            TriggerError::Rejected { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            TriggerError::InvalidResponse(_) => false,
        }
    }
}
