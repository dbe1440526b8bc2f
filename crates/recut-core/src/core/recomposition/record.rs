//! Recomposition Records
//!
//! A tracked submission of an updated composition to the rendering backend,
//! and the one-directional status machine it moves through.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::{CompositionConfig, UpdatedCompositionConfig};
use crate::core::edit::EditPlan;
use crate::core::{CompositionId, CoreError, CoreResult, GenerationId, RecompositionId, RenderJobId};

// =============================================================================
// Status
// =============================================================================

/// Lifecycle status of a recomposition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecompositionStatus {
    /// Record created, backend not yet called
    Pending,
    /// Backend accepted the submission
    Triggered,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl RecompositionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RecompositionStatus::Completed | RecompositionStatus::Failed | RecompositionStatus::Cancelled
        )
    }

    /// Whether `self -> next` is a legal move. Repeating a status is not a move.
    pub fn can_transition_to(&self, next: RecompositionStatus) -> bool {
        use RecompositionStatus::*;
        match (self, next) {
            (Pending, Triggered) => true,
            (Triggered, Processing | Completed | Failed) => true,
            (Processing, Completed | Failed) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecompositionStatus::Pending => "PENDING",
            RecompositionStatus::Triggered => "TRIGGERED",
            RecompositionStatus::Processing => "PROCESSING",
            RecompositionStatus::Completed => "COMPLETED",
            RecompositionStatus::Failed => "FAILED",
            RecompositionStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for RecompositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Record
// =============================================================================

/// Tracked recomposition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecompositionRecord {
    pub recomposition_id: RecompositionId,
    pub composition_id: CompositionId,
    pub generation_id: GenerationId,
    pub edit_plan: EditPlan,
    pub config: UpdatedCompositionConfig,
    pub rendering_job_id: Option<RenderJobId>,
    pub status: RecompositionStatus,
    pub created_at: DateTime<Utc>,
    pub triggered_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status_url: Option<String>,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
    pub error_details: Option<serde_json::Value>,
    /// Pre-edit composition config
    pub rollback_config: Option<CompositionConfig>,
    pub can_rollback: bool,
    /// Record this one rolls back, if any
    pub rollback_of: Option<RecompositionId>,
}

impl RecompositionRecord {
    /// Creates a PENDING record with a fresh ULID
    pub fn new(edit_plan: EditPlan, config: UpdatedCompositionConfig) -> Self {
        let rollback_config = Some(config.original_config.clone());
        Self {
            recomposition_id: ulid::Ulid::new().to_string(),
            composition_id: config.composition_id.clone(),
            generation_id: config.generation_id.clone(),
            edit_plan,
            config,
            rendering_job_id: None,
            status: RecompositionStatus::Pending,
            created_at: Utc::now(),
            triggered_at: None,
            completed_at: None,
            status_url: None,
            result_url: None,
            error_message: None,
            error_details: None,
            rollback_config,
            can_rollback: true,
            rollback_of: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Moves to `next`, stamping completion on terminal states.
    ///
    /// Returns `Ok(false)` when the record is already in `next`, leaving it
    /// untouched, so replayed callbacks are harmless.
    pub fn transition(&mut self, next: RecompositionStatus) -> CoreResult<bool> {
        if self.status == next {
            return Ok(false);
        }
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                id: self.recomposition_id.clone(),
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(true)
    }

    /// Records the backend acceptance and tracking urls. Only a PENDING
    /// record can be marked; an already triggered one keeps its job id.
    pub fn mark_triggered(
        &mut self,
        job_id: RenderJobId,
        status_url: String,
        result_url: String,
    ) -> CoreResult<()> {
        if !self.transition(RecompositionStatus::Triggered)? {
            return Err(CoreError::InvalidTransition {
                id: self.recomposition_id.clone(),
                from: self.status,
                to: RecompositionStatus::Triggered,
            });
        }
        self.rendering_job_id = Some(job_id);
        self.triggered_at = Some(Utc::now());
        self.status_url = Some(status_url);
        self.result_url = Some(result_url);
        Ok(())
    }

    /// Drops the rollback snapshot
    pub fn discard_rollback(&mut self) {
        self.rollback_config = None;
        self.can_rollback = false;
    }

    /// Seconds between trigger and completion, when both are known
    pub fn render_seconds(&self) -> Option<f64> {
        let started = self.triggered_at?;
        let finished = self.completed_at?;
        Some((finished - started).num_milliseconds() as f64 / 1000.0)
    }
}
