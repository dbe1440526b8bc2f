//! Timeline Applier
//!
//! Executes a validated EditPlan against the clip collection. Operations run
//! in plan order and fail individually: a failed operation leaves the clips it
//! targeted untouched and the rest of the plan still runs.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::plan::{
    EditOperation, EditPlan, OperationParams, OperationType, OverlayParams, ReorderParams,
    TimingParams, TrimParams,
};
use crate::core::timeline::{sort_by_sequence, Clip};
use crate::core::{TimeSec, DURATION_TOLERANCE_SEC};

// =============================================================================
// Apply Result
// =============================================================================

/// An operation that could not be applied
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationFailure {
    pub operation_index: usize,
    pub operation_type: OperationType,
    pub reason: String,
}

/// Outcome of applying a plan
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyResult {
    /// Indices of operations that succeeded, including no-ops
    pub successful: Vec<usize>,
    pub failures: Vec<OperationFailure>,
    /// Indices of operations whose type has no timeline effect here
    pub skipped: Vec<usize>,
    /// True when every operation succeeded
    pub success: bool,
}

impl ApplyResult {
    pub fn failure_messages(&self) -> Vec<String> {
        self.failures
            .iter()
            .map(|f| format!("operation {} ({}): {}", f.operation_index, f.operation_type, f.reason))
            .collect()
    }
}

type StepResult = Result<Applied, String>;

enum Applied {
    Mutated,
    NoOp,
}

// =============================================================================
// Timeline Applier
// =============================================================================

#[derive(Clone, Debug)]
pub struct TimelineApplier {
    tolerance: TimeSec,
}

impl TimelineApplier {
    pub fn new() -> Self {
        Self {
            tolerance: DURATION_TOLERANCE_SEC,
        }
    }

    /// Sets the slack allowed when checking trims against original bounds
    pub fn with_tolerance(mut self, tolerance: TimeSec) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Applies `plan` to `clips` in plan order.
    ///
    /// Clips are sorted by `sequence_order` first so operation indices
    /// resolve the same way they did during validation. Positions in the
    /// slice stay fixed for the whole plan; reorders only rewrite
    /// `sequence_order` and leave re-timing to reflow.
    pub fn apply(&self, plan: &EditPlan, clips: &mut [Clip]) -> ApplyResult {
        sort_by_sequence(clips);

        let mut result = ApplyResult::default();

        for (index, op) in plan.operations.iter().enumerate() {
            match self.apply_operation(op, clips) {
                Ok(Applied::Mutated) => {
                    debug!("Applied operation {} ({})", index, op.operation_type());
                    result.successful.push(index);
                }
                Ok(Applied::NoOp) => {
                    warn!(
                        "Operation {} ({}) has no timeline effect; recorded as a no-op",
                        index,
                        op.operation_type()
                    );
                    result.successful.push(index);
                    result.skipped.push(index);
                }
                Err(reason) => {
                    warn!(
                        "Operation {} ({}) failed: {}",
                        index,
                        op.operation_type(),
                        reason
                    );
                    result.failures.push(OperationFailure {
                        operation_index: index,
                        operation_type: op.operation_type(),
                        reason,
                    });
                }
            }
        }

        result.success = result.successful.len() == plan.operations.len();
        result
    }

    fn apply_operation(&self, op: &EditOperation, clips: &mut [Clip]) -> StepResult {
        match &op.params {
            OperationParams::Trim(params) => self.apply_trim(op, params, clips),
            OperationParams::Reorder(params) => Self::apply_reorder(op, params, clips),
            OperationParams::Timing(params) => Self::apply_timing(op, params, clips),
            OperationParams::Overlay(params) => Self::check_overlay(params),
            _ => Ok(Applied::NoOp),
        }
    }

    fn check_targets(op: &EditOperation, clips: &[Clip]) -> Result<(), String> {
        match op.target_clips.iter().find(|&&i| i >= clips.len()) {
            Some(bad) => Err(format!(
                "clip index {} out of range ({} clips)",
                bad,
                clips.len()
            )),
            None => Ok(()),
        }
    }

    /// Both forms keep the clip start. `duration` sets the new length and
    /// `end_time` is the new end as an offset from the clip start; a given
    /// `start_time` must precede it but does not move the clip.
    fn apply_trim(&self, op: &EditOperation, params: &TrimParams, clips: &mut [Clip]) -> StepResult {
        Self::check_targets(op, clips)?;
        if op.target_clips.is_empty() {
            return Err("trim has no target clip".to_string());
        }

        // Compute every new span before touching any clip
        let mut spans = Vec::with_capacity(op.target_clips.len());
        for &target in &op.target_clips {
            let clip = &clips[target];
            let (start, end) = match (params.duration, params.end_time) {
                (Some(duration), _) => (clip.start_time_seconds, clip.start_time_seconds + duration),
                (None, Some(end_offset)) => {
                    if let Some(start_offset) = params.start_time {
                        if start_offset >= end_offset {
                            return Err(format!(
                                "trim of clip {} has empty range {:.3}~{:.3}",
                                clip.clip_id, start_offset, end_offset
                            ));
                        }
                    }
                    (clip.start_time_seconds, clip.start_time_seconds + end_offset)
                }
                (None, None) => return Err("trim needs a duration or end_time".to_string()),
            };

            let duration = end - start;
            if !(duration.is_finite() && duration > 0.0) {
                return Err(format!(
                    "trim of clip {} gives non-positive duration {:.3}s",
                    clip.clip_id, duration
                ));
            }
            if start < clip.start_time_seconds - self.tolerance
                || end > clip.end_time_seconds + self.tolerance
            {
                return Err(format!(
                    "trim of clip {} to {:.3}~{:.3} exceeds its bounds {:.3}~{:.3}",
                    clip.clip_id, start, end, clip.start_time_seconds, clip.end_time_seconds
                ));
            }
            spans.push((target, start, end));
        }

        for (target, start, end) in spans {
            let clip = &mut clips[target];
            clip.start_time_seconds = start;
            clip.end_time_seconds = end;
            clip.sync_duration();
        }
        Ok(Applied::Mutated)
    }

    fn apply_reorder(op: &EditOperation, params: &ReorderParams, clips: &mut [Clip]) -> StepResult {
        Self::check_targets(op, clips)?;
        let new_order = params
            .new_order
            .as_ref()
            .ok_or_else(|| "reorder has no new_order".to_string())?;
        if new_order.len() != op.target_clips.len() {
            return Err(format!(
                "new_order has {} entries for {} target clip(s)",
                new_order.len(),
                op.target_clips.len()
            ));
        }

        for (&target, &order) in op.target_clips.iter().zip(new_order) {
            clips[target].sequence_order = order;
        }
        Ok(Applied::Mutated)
    }

    fn apply_timing(op: &EditOperation, params: &TimingParams, clips: &mut [Clip]) -> StepResult {
        Self::check_targets(op, clips)?;
        let offset = match params.time_offset {
            Some(offset) if offset.is_finite() => offset,
            _ => return Err("timing needs a finite time_offset".to_string()),
        };

        for &target in &op.target_clips {
            clips[target].shift_by(offset);
        }
        Ok(Applied::Mutated)
    }

    fn check_overlay(params: &OverlayParams) -> StepResult {
        let start = params
            .start_time
            .ok_or_else(|| "overlay needs a start_time".to_string())?;
        if matches!(params.duration, Some(d) if d <= 0.0) {
            return Err("overlay duration must be positive".to_string());
        }
        if matches!(params.end_time, Some(end) if end <= start) {
            return Err("overlay end_time must be after start_time".to_string());
        }
        // Overlay metadata lives in the composition config, not on clips
        Ok(Applied::Mutated)
    }
}

impl Default for TimelineApplier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clips() -> Vec<Clip> {
        vec![
            Clip::new("c0", "g", 0, 0.0, 5.0),
            Clip::new("c1", "g", 1, 5.0, 5.0),
            Clip::new("c2", "g", 2, 10.0, 5.0),
        ]
    }

    #[test]
    fn test_trim_by_duration() {
        let mut clips = clips();
        let plan = EditPlan::new("x").add_operation(EditOperation::trim_duration(0, 3.0));

        let result = TimelineApplier::new().apply(&plan, &mut clips);
        assert!(result.success);
        assert_eq!(result.successful, vec![0]);
        assert_eq!(clips[0].end_time_seconds, 3.0);
        assert_eq!(clips[0].duration_seconds, 3.0);
    }

    #[test]
    fn test_trim_by_range_keeps_start() {
        let mut clips = clips();
        let plan = EditPlan::new("x")
            .add_operation(EditOperation::trim_range(0, 1.0, 4.0))
            .add_operation(EditOperation::trim_range(1, 0.0, 2.5));

        assert!(TimelineApplier::new().apply(&plan, &mut clips).success);
        assert_eq!(clips[0].start_time_seconds, 0.0);
        assert_eq!(clips[0].end_time_seconds, 4.0);
        assert_eq!(clips[0].duration_seconds, 4.0);
        assert_eq!(clips[1].start_time_seconds, 5.0);
        assert_eq!(clips[1].end_time_seconds, 7.5);
    }

    #[test]
    fn test_trim_failure_does_not_mutate() {
        let mut clips = clips();
        let plan = EditPlan::new("x")
            .add_operation(EditOperation::trim_duration(0, 8.0))
            .add_operation(EditOperation::trim_range(1, 2.0, 2.0));

        let result = TimelineApplier::new().apply(&plan, &mut clips);
        assert!(!result.success);
        assert!(result.successful.is_empty());
        assert_eq!(result.failures.len(), 2);
        assert_eq!(result.failures[0].operation_type, OperationType::Trim);
        assert_eq!(clips, super::tests::clips());
    }

    #[test]
    fn test_failure_does_not_abort_plan() {
        let mut clips = clips();
        let plan = EditPlan::new("x")
            .add_operation(EditOperation::trim_duration(9, 1.0))
            .add_operation(EditOperation::timing(vec![2], 1.5));

        let result = TimelineApplier::new().apply(&plan, &mut clips);
        assert!(!result.success);
        assert_eq!(result.successful, vec![1]);
        assert_eq!(result.failures[0].operation_index, 0);
        assert!(result.failures[0].reason.contains("out of range"));
        assert_eq!(clips[2].start_time_seconds, 11.5);
        assert_eq!(result.failure_messages().len(), 1);
    }

    #[test]
    fn test_reorder_rewrites_sequence_only() {
        let mut clips = clips();
        let plan = EditPlan::new("x").add_operation(EditOperation::reorder(vec![1, 2], vec![2, 1]));

        assert!(TimelineApplier::new().apply(&plan, &mut clips).success);
        assert_eq!(clips[1].sequence_order, 2);
        assert_eq!(clips[2].sequence_order, 1);
        // Timing untouched until reflow
        assert_eq!(clips[1].start_time_seconds, 5.0);
        assert_eq!(clips[2].start_time_seconds, 10.0);
    }

    #[test]
    fn test_indices_resolve_against_sequence_order() {
        let mut clips = clips();
        clips.reverse();
        let plan = EditPlan::new("x").add_operation(EditOperation::trim_duration(0, 2.0));

        TimelineApplier::new().apply(&plan, &mut clips);
        assert_eq!(clips[0].clip_id, "c0");
        assert_eq!(clips[0].duration_seconds, 2.0);
    }

    #[test]
    fn test_overlay_is_checked_not_applied() {
        let mut clips = clips();
        let plan = EditPlan::new("x")
            .add_operation(EditOperation::overlay(OverlayParams {
                text: Some("Title".into()),
                start_time: Some(1.0),
                duration: Some(2.0),
                ..Default::default()
            }))
            .add_operation(EditOperation::overlay(OverlayParams {
                text: Some("Broken".into()),
                ..Default::default()
            }));

        let result = TimelineApplier::new().apply(&plan, &mut clips);
        assert_eq!(result.successful, vec![0]);
        assert_eq!(result.failures[0].operation_index, 1);
        assert_eq!(clips, super::tests::clips());
    }

    #[test]
    fn test_unhandled_types_are_skipped() {
        let mut clips = clips();
        let plan = EditPlan::new("x")
            .add_operation(EditOperation::speed(0, 2.0))
            .add_operation(EditOperation::split(1, 2.0))
            .add_operation(EditOperation::filter(2, "sepia"));

        let result = TimelineApplier::new().apply(&plan, &mut clips);
        assert!(result.success);
        assert_eq!(result.skipped, vec![0, 1, 2]);
        assert_eq!(clips, super::tests::clips());
    }
}
