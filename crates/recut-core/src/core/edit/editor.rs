//! Timeline Editor
//!
//! Coordinates one edit request end to end: load clips, validate, apply,
//! reflow and (optionally) write the result back. Requests against the same
//! generation are serialized so their phases never interleave.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{info, warn};

use super::applier::{ApplyResult, TimelineApplier};
use super::plan::EditPlan;
use super::validator::{TimelineValidator, ValidationResult};
use crate::core::settings::ValidationSettings;
use crate::core::timeline::{reflow_with_tolerance, total_duration, Clip, ReflowReport};
use crate::core::{CoreError, CoreResult, GenerationId, TimeSec, DURATION_TOLERANCE_SEC};

// =============================================================================
// Collaborators
// =============================================================================

/// Persistence for generated clips
#[async_trait]
pub trait ClipStore: Send + Sync {
    /// Loads the clips of a generation
    async fn load_clips(&self, generation_id: &str) -> CoreResult<Vec<Clip>>;

    /// Writes back the timing of a generation's clips
    async fn save_clips(&self, generation_id: &str, clips: &[Clip]) -> CoreResult<()>;
}

/// What the classifier sees about the current timeline
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanningContext {
    pub generation_id: GenerationId,
    pub clip_count: usize,
    pub total_duration: TimeSec,
}

/// Turns a natural-language request into an EditPlan
#[async_trait]
pub trait EditPlanner: Send + Sync {
    async fn plan(&self, request: &str, context: &PlanningContext) -> CoreResult<EditPlan>;
}

/// Clip store backed by a map, for embedding and tests
#[derive(Default)]
pub struct InMemoryClipStore {
    generations: RwLock<HashMap<GenerationId, Vec<Clip>>>,
}

impl InMemoryClipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, generation_id: &str, clips: Vec<Clip>) {
        self.generations
            .write()
            .await
            .insert(generation_id.to_string(), clips);
    }
}

#[async_trait]
impl ClipStore for InMemoryClipStore {
    async fn load_clips(&self, generation_id: &str) -> CoreResult<Vec<Clip>> {
        self.generations
            .read()
            .await
            .get(generation_id)
            .cloned()
            .ok_or_else(|| CoreError::GenerationNotFound(generation_id.to_string()))
    }

    async fn save_clips(&self, generation_id: &str, clips: &[Clip]) -> CoreResult<()> {
        self.generations
            .write()
            .await
            .insert(generation_id.to_string(), clips.to_vec());
        Ok(())
    }
}

// =============================================================================
// Timeline Editor
// =============================================================================

/// Result of running a plan through the editing pipeline
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EditOutcome {
    pub generation_id: GenerationId,
    pub plan: EditPlan,
    pub validation: ValidationResult,
    pub apply: ApplyResult,
    pub reflow: ReflowReport,
    /// Clips after apply and reflow, ordered by `sequence_order`
    pub clips: Vec<Clip>,
    /// Whether the clips were written back to the store
    pub saved: bool,
}

impl EditOutcome {
    pub fn total_duration(&self) -> TimeSec {
        total_duration(&self.clips)
    }
}

pub struct TimelineEditor {
    clips: Arc<dyn ClipStore>,
    planner: Option<Arc<dyn EditPlanner>>,
    validator: TimelineValidator,
    applier: TimelineApplier,
    tolerance: TimeSec,
    locks: Mutex<HashMap<GenerationId, Arc<Mutex<()>>>>,
}

impl TimelineEditor {
    pub fn new(clips: Arc<dyn ClipStore>) -> Self {
        Self {
            clips,
            planner: None,
            validator: TimelineValidator::new(),
            applier: TimelineApplier::new(),
            tolerance: DURATION_TOLERANCE_SEC,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Attaches a request classifier
    pub fn with_planner(mut self, planner: Arc<dyn EditPlanner>) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn with_validator(mut self, validator: TimelineValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Applies tolerance and confidence settings to every stage
    pub fn with_settings(mut self, settings: &ValidationSettings) -> Self {
        self.validator = TimelineValidator::from_settings(settings)
            .with_matrix(self.validator.matrix().clone());
        self.applier = TimelineApplier::new().with_tolerance(settings.duration_tolerance_sec);
        self.tolerance = settings.duration_tolerance_sec;
        self
    }

    /// Validates against the current clips without mutating anything
    pub async fn validate(&self, generation_id: &str, plan: &EditPlan) -> CoreResult<ValidationResult> {
        let clips = self.clips.load_clips(generation_id).await?;
        Ok(self.validator.validate(plan, &clips))
    }

    /// Runs the full pipeline without writing back
    pub async fn preview(&self, generation_id: &str, plan: &EditPlan) -> CoreResult<EditOutcome> {
        self.run_exclusive(generation_id, plan, false).await
    }

    /// Runs the full pipeline and writes the clips back to the store
    pub async fn apply_plan(&self, generation_id: &str, plan: &EditPlan) -> CoreResult<EditOutcome> {
        self.run_exclusive(generation_id, plan, true).await
    }

    /// Classifies `request` into a plan, then applies it
    pub async fn request_edit(&self, generation_id: &str, request: &str) -> CoreResult<EditOutcome> {
        let planner = self
            .planner
            .as_ref()
            .ok_or_else(|| CoreError::PlanningFailed("no edit planner configured".to_string()))?;

        let clips = self.clips.load_clips(generation_id).await?;
        let context = PlanningContext {
            generation_id: generation_id.to_string(),
            clip_count: clips.len(),
            total_duration: total_duration(&clips),
        };

        let plan = planner.plan(request, &context).await?;
        info!(
            "Planned {} operation(s) for generation {}: {}",
            plan.operation_count(),
            generation_id,
            plan.summary()
        );

        self.apply_plan(generation_id, &plan).await
    }

    async fn run_exclusive(
        &self,
        generation_id: &str,
        plan: &EditPlan,
        save: bool,
    ) -> CoreResult<EditOutcome> {
        let guard = self.lock(generation_id).await;
        let outcome = self.run(generation_id, plan, save).await;
        drop(guard);
        self.release(generation_id).await;
        outcome
    }

    async fn lock(&self, generation_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(generation_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Forgets the lock of a generation nobody holds or waits on
    async fn release(&self, generation_id: &str) {
        let mut locks = self.locks.lock().await;
        if locks
            .get(generation_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(generation_id);
        }
    }

    #[cfg(test)]
    async fn tracked_locks(&self) -> usize {
        self.locks.lock().await.len()
    }

    async fn run(&self, generation_id: &str, plan: &EditPlan, save: bool) -> CoreResult<EditOutcome> {
        let mut clips = self.clips.load_clips(generation_id).await?;

        let validation = self.validator.validate(plan, &clips);
        if !validation.is_feasible {
            warn!(
                "Rejected plan for generation {}: {}",
                generation_id,
                validation.error_messages().join("; ")
            );
            return Err(CoreError::PlanRejected {
                issues: validation.errors,
            });
        }

        let apply = self.applier.apply(plan, &mut clips);
        let reflow = reflow_with_tolerance(&mut clips, self.tolerance);

        if save {
            self.clips.save_clips(generation_id, &clips).await?;
        }

        info!(
            "Edited generation {}: {}/{} operation(s) applied, {} failed, total {:.2}s{}",
            generation_id,
            apply.successful.len(),
            plan.operations.len(),
            apply.failures.len(),
            reflow.total_duration,
            if save { "" } else { " (preview)" }
        );

        Ok(EditOutcome {
            generation_id: generation_id.to_string(),
            plan: plan.clone(),
            validation,
            apply,
            reflow,
            clips,
            saved: save,
        })
    }
}
