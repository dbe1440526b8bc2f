//! Timeline Validator
//!
//! Checks an EditPlan against the current clip collection before anything is
//! mutated. Every defect is collected; validation never stops at the first one.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::conflicts::{Conflict, ConflictMatrix};
use super::plan::{
    EditOperation, EditPlan, OperationParams, OverlayParams, ReorderParams, SplitParams,
    TrimParams, MAX_PRIORITY,
};
use crate::core::settings::ValidationSettings;
use crate::core::timeline::Clip;
use crate::core::{CoreError, CoreResult, TimeSec, DURATION_TOLERANCE_SEC};

// =============================================================================
// Validation Result
// =============================================================================

/// Category of a plan defect
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Bad clip index or malformed parameters
    Validation,
    /// Semantically incompatible operations on the same clip
    Conflict,
}

/// A single validation finding
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanIssue {
    /// Operation index (if the issue belongs to one operation)
    pub operation_index: Option<usize>,
    pub kind: IssueKind,
    /// Machine-readable code
    pub code: String,
    pub message: String,
}

impl PlanIssue {
    pub fn new(operation_index: Option<usize>, kind: IssueKind, code: &str, message: &str) -> Self {
        Self {
            operation_index,
            kind,
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    /// Parameter or index defect for an operation
    pub fn validation(operation_index: usize, code: &str, message: &str) -> Self {
        Self::new(Some(operation_index), IssueKind::Validation, code, message)
    }

    /// Plan-level finding not tied to one operation
    pub fn plan(code: &str, message: &str) -> Self {
        Self::new(None, IssueKind::Validation, code, message)
    }

    fn from_conflict(conflict: &Conflict) -> Self {
        Self::new(
            Some(conflict.second_index),
            IssueKind::Conflict,
            "OPERATION_CONFLICT",
            &conflict.message(),
        )
    }
}

/// Feasibility verdict for a plan
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_feasible: bool,
    pub errors: Vec<PlanIssue>,
    pub warnings: Vec<PlanIssue>,
    /// Conflicts found, also reported in `errors`
    pub conflicts: Vec<Conflict>,
}

impl ValidationResult {
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }

    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(|w| w.message.clone()).collect()
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Converts an infeasible verdict into `CoreError::PlanRejected`
    pub fn into_result(self) -> CoreResult<Self> {
        if self.is_feasible {
            Ok(self)
        } else {
            Err(CoreError::PlanRejected {
                issues: self.errors,
            })
        }
    }
}

// =============================================================================
// Timeline Validator
// =============================================================================

/// Validates plans against a clip timeline
#[derive(Clone, Debug)]
pub struct TimelineValidator {
    matrix: ConflictMatrix,
    duration_tolerance: TimeSec,
    min_confidence: f64,
}

impl TimelineValidator {
    /// Creates a validator with the default conflict matrix
    pub fn new() -> Self {
        Self {
            matrix: ConflictMatrix::default(),
            duration_tolerance: DURATION_TOLERANCE_SEC,
            min_confidence: 0.5,
        }
    }

    pub fn from_settings(settings: &ValidationSettings) -> Self {
        Self {
            matrix: ConflictMatrix::default(),
            duration_tolerance: settings.duration_tolerance_sec,
            min_confidence: settings.min_confidence,
        }
    }

    /// Replaces the conflict matrix
    pub fn with_matrix(mut self, matrix: ConflictMatrix) -> Self {
        self.matrix = matrix;
        self
    }

    pub fn matrix(&self) -> &ConflictMatrix {
        &self.matrix
    }

    /// Validates `plan` against `clips`. Clip indices refer to the clips
    /// ordered by `sequence_order`; the input does not need to be sorted.
    pub fn validate(&self, plan: &EditPlan, clips: &[Clip]) -> ValidationResult {
        let mut ordered: Vec<&Clip> = clips.iter().collect();
        ordered.sort_by_key(|clip| clip.sequence_order);

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        self.check_plan(plan, &ordered, &mut warnings);

        for (index, op) in plan.operations.iter().enumerate() {
            self.check_operation(index, op, &ordered, &mut errors, &mut warnings);
        }

        let conflicts = self.matrix.conflicts_in(plan);
        errors.extend(conflicts.iter().map(PlanIssue::from_conflict));

        let is_feasible = errors.is_empty();
        debug!(
            "Validated plan with {} operation(s) over {} clip(s): feasible={}, errors={}, warnings={}",
            plan.operations.len(),
            clips.len(),
            is_feasible,
            errors.len(),
            warnings.len()
        );

        ValidationResult {
            is_feasible,
            errors,
            warnings,
            conflicts,
        }
    }

    fn check_plan(&self, plan: &EditPlan, clips: &[&Clip], warnings: &mut Vec<PlanIssue>) {
        if plan.operations.is_empty() {
            warnings.push(PlanIssue::plan("EMPTY_PLAN", "Edit plan contains no operations"));
        }
        if !plan.safety_check_passed {
            warnings.push(PlanIssue::plan(
                "SAFETY_CHECK_FAILED",
                "Edit plan did not pass the upstream safety check",
            ));
        }
        if plan.confidence_score < self.min_confidence {
            warnings.push(PlanIssue::plan(
                "LOW_CONFIDENCE",
                &format!(
                    "Classifier confidence {:.2} is below {:.2}",
                    plan.confidence_score, self.min_confidence
                ),
            ));
        }
        for clip in clips {
            if !clip.has_consistent_duration(self.duration_tolerance) {
                warnings.push(PlanIssue::plan(
                    "INCONSISTENT_CLIP_DURATION",
                    &format!(
                        "Clip {} stores duration {:.3}s but spans {:.3}s",
                        clip.clip_id,
                        clip.duration_seconds,
                        clip.span()
                    ),
                ));
            }
        }
    }

    fn check_operation(
        &self,
        index: usize,
        op: &EditOperation,
        clips: &[&Clip],
        errors: &mut Vec<PlanIssue>,
        warnings: &mut Vec<PlanIssue>,
    ) {
        for &target in &op.target_clips {
            if target >= clips.len() {
                errors.push(PlanIssue::validation(
                    index,
                    "CLIP_INDEX_OUT_OF_RANGE",
                    &format!(
                        "Operation {} ({}) targets clip index {} but only {} clip(s) exist",
                        index,
                        op.operation_type(),
                        target,
                        clips.len()
                    ),
                ));
            }
        }

        if op.priority > MAX_PRIORITY {
            warnings.push(PlanIssue::validation(
                index,
                "PRIORITY_OUT_OF_RANGE",
                &format!("Operation {} priority {} exceeds {}", index, op.priority, MAX_PRIORITY),
            ));
        }

        if let Some(range) = &op.target_time_range {
            if !range.is_valid() {
                errors.push(PlanIssue::validation(
                    index,
                    "INVALID_TIME_RANGE",
                    &format!(
                        "Operation {} time range {}~{} is invalid",
                        index, range.start, range.end
                    ),
                ));
            }
        }

        // Only in-range targets are used for per-clip checks
        let targets: Vec<&Clip> = op
            .target_clips
            .iter()
            .filter_map(|&i| clips.get(i).copied())
            .collect();

        match &op.params {
            OperationParams::Trim(params) => {
                Self::check_trim(index, op, params, &targets, self.duration_tolerance, errors, warnings)
            }
            OperationParams::Split(params) => Self::check_split(index, op, params, &targets, errors),
            OperationParams::Reorder(params) => {
                Self::check_reorder(index, op, params, clips, errors, warnings)
            }
            OperationParams::Timing(params) => match params.time_offset {
                Some(offset) if offset.is_finite() => {
                    if op.target_clips.is_empty() {
                        warnings.push(PlanIssue::validation(
                            index,
                            "NO_TARGETS",
                            &format!("Timing operation {} targets no clips", index),
                        ));
                    }
                }
                Some(_) => errors.push(PlanIssue::validation(
                    index,
                    "INVALID_TIME_OFFSET",
                    "Timing time_offset must be a finite number",
                )),
                None => errors.push(PlanIssue::validation(
                    index,
                    "MISSING_TIME_OFFSET",
                    "Timing requires a time_offset parameter",
                )),
            },
            OperationParams::Swap(_) => {
                if op.distinct_targets().len() != 2 {
                    errors.push(PlanIssue::validation(
                        index,
                        "SWAP_REQUIRES_TWO_CLIPS",
                        &format!(
                            "Swap operation {} needs exactly 2 distinct clips, got {}",
                            index,
                            op.distinct_targets().len()
                        ),
                    ));
                }
            }
            OperationParams::Merge(_) => {
                if op.distinct_targets().len() < 2 {
                    errors.push(PlanIssue::validation(
                        index,
                        "MERGE_REQUIRES_TWO_CLIPS",
                        &format!("Merge operation {} needs at least 2 distinct clips", index),
                    ));
                }
            }
            OperationParams::Speed(params) => match params.factor {
                Some(factor) if !(factor.is_finite() && factor > 0.0) => {
                    errors.push(PlanIssue::validation(
                        index,
                        "INVALID_SPEED_FACTOR",
                        &format!("Speed factor must be positive, got {}", factor),
                    ))
                }
                Some(_) => {}
                None => warnings.push(PlanIssue::validation(
                    index,
                    "MISSING_SPEED_FACTOR",
                    "Speed operation has no factor and will not change playback",
                )),
            },
            OperationParams::Volume(params) => {
                if let Some(level) = params.level {
                    if !(level.is_finite() && level >= 0.0) {
                        errors.push(PlanIssue::validation(
                            index,
                            "INVALID_VOLUME_LEVEL",
                            &format!("Volume level must be non-negative, got {}", level),
                        ));
                    }
                }
                for (name, fade) in [("fade_in", params.fade_in), ("fade_out", params.fade_out)] {
                    if matches!(fade, Some(f) if !(f.is_finite() && f >= 0.0)) {
                        errors.push(PlanIssue::validation(
                            index,
                            "INVALID_FADE",
                            &format!("Volume {} must be non-negative", name),
                        ));
                    }
                }
            }
            OperationParams::Transition(params) => {
                if matches!(params.duration, Some(d) if !(d.is_finite() && d > 0.0)) {
                    errors.push(PlanIssue::validation(
                        index,
                        "INVALID_TRANSITION_DURATION",
                        "Transition duration must be positive",
                    ));
                }
            }
            OperationParams::Overlay(params) => Self::check_overlay(index, params, errors, warnings),
            OperationParams::Crop(_) | OperationParams::Filter(_) => {}
        }
    }

    fn check_trim(
        index: usize,
        op: &EditOperation,
        params: &TrimParams,
        targets: &[&Clip],
        tolerance: TimeSec,
        errors: &mut Vec<PlanIssue>,
        warnings: &mut Vec<PlanIssue>,
    ) {
        if op.target_clips.is_empty() {
            errors.push(PlanIssue::validation(
                index,
                "MISSING_TARGET_CLIPS",
                "Trim requires a target clip",
            ));
        }

        match (params.duration, params.start_time, params.end_time) {
            (Some(duration), _, _) => {
                if !(duration.is_finite() && duration > 0.0) {
                    errors.push(PlanIssue::validation(
                        index,
                        "INVALID_TRIM_DURATION",
                        &format!("Trim duration must be positive, got {}", duration),
                    ));
                    return;
                }
                for clip in targets {
                    if duration > clip.duration_seconds + tolerance {
                        errors.push(PlanIssue::validation(
                            index,
                            "TRIM_EXCEEDS_CLIP",
                            &format!(
                                "Trim duration {:.3}s exceeds clip {} duration {:.3}s",
                                duration, clip.clip_id, clip.duration_seconds
                            ),
                        ));
                    }
                }
            }
            (None, Some(start), Some(end)) => {
                if !(start.is_finite() && end.is_finite()) || start >= end {
                    errors.push(PlanIssue::validation(
                        index,
                        "INVALID_TRIM_RANGE",
                        &format!("Trim start_time {} must be before end_time {}", start, end),
                    ));
                    return;
                }
                for clip in targets {
                    if end > clip.duration_seconds + tolerance {
                        warnings.push(PlanIssue::validation(
                            index,
                            "TRIM_END_EXCEEDS_CLIP",
                            &format!(
                                "Trim end_time {:.3}s is past the end of clip {} ({:.3}s)",
                                end, clip.clip_id, clip.duration_seconds
                            ),
                        ));
                    }
                }
            }
            _ => errors.push(PlanIssue::validation(
                index,
                "MISSING_TRIM_PARAMETERS",
                "Trim requires either duration or both start_time and end_time",
            )),
        }
    }

    fn check_split(
        index: usize,
        op: &EditOperation,
        params: &SplitParams,
        targets: &[&Clip],
        errors: &mut Vec<PlanIssue>,
    ) {
        if op.target_clips.is_empty() {
            errors.push(PlanIssue::validation(
                index,
                "MISSING_TARGET_CLIPS",
                "Split requires a target clip",
            ));
        }

        let Some(split_time) = params.split_time else {
            errors.push(PlanIssue::validation(
                index,
                "MISSING_SPLIT_TIME",
                "Split requires a split_time parameter",
            ));
            return;
        };

        for clip in targets {
            if !(split_time > 0.0 && split_time < clip.duration_seconds) {
                errors.push(PlanIssue::validation(
                    index,
                    "INVALID_SPLIT_TIME",
                    &format!(
                        "Split time {:.3}s must fall strictly inside clip {} (0~{:.3}s)",
                        split_time, clip.clip_id, clip.duration_seconds
                    ),
                ));
            }
        }
    }

    fn check_reorder(
        index: usize,
        op: &EditOperation,
        params: &ReorderParams,
        clips: &[&Clip],
        errors: &mut Vec<PlanIssue>,
        warnings: &mut Vec<PlanIssue>,
    ) {
        let distinct = op.distinct_targets();
        if distinct.len() < 2 {
            errors.push(PlanIssue::validation(
                index,
                "REORDER_TOO_FEW_CLIPS",
                &format!("Reorder operation {} needs at least 2 distinct clips", index),
            ));
        }
        if distinct.len() != op.target_clips.len() {
            errors.push(PlanIssue::validation(
                index,
                "DUPLICATE_REORDER_TARGET",
                &format!("Reorder operation {} lists a clip more than once", index),
            ));
        }

        let Some(new_order) = &params.new_order else {
            errors.push(PlanIssue::validation(
                index,
                "MISSING_NEW_ORDER",
                "Reorder requires a new_order parameter",
            ));
            return;
        };

        if new_order.len() != op.target_clips.len() {
            errors.push(PlanIssue::validation(
                index,
                "NEW_ORDER_LENGTH_MISMATCH",
                &format!(
                    "Reorder new_order has {} entries for {} target clip(s)",
                    new_order.len(),
                    op.target_clips.len()
                ),
            ));
        }

        let unique: BTreeSet<i64> = new_order.iter().copied().collect();
        if unique.len() != new_order.len() {
            errors.push(PlanIssue::validation(
                index,
                "DUPLICATE_NEW_ORDER",
                &format!("Reorder new_order {:?} contains duplicates", new_order),
            ));
        }

        let untouched: HashSet<i64> = clips
            .iter()
            .enumerate()
            .filter(|(i, _)| !distinct.contains(i))
            .map(|(_, clip)| clip.sequence_order)
            .collect();
        let collisions: Vec<i64> = unique.iter().copied().filter(|o| untouched.contains(o)).collect();
        if !collisions.is_empty() {
            warnings.push(PlanIssue::validation(
                index,
                "NEW_ORDER_COLLISION",
                &format!(
                    "Reorder positions {:?} are already used by untouched clips",
                    collisions
                ),
            ));
        }
    }

    fn check_overlay(
        index: usize,
        params: &OverlayParams,
        errors: &mut Vec<PlanIssue>,
        warnings: &mut Vec<PlanIssue>,
    ) {
        if params.start_time.is_none() {
            warnings.push(PlanIssue::validation(
                index,
                "MISSING_OVERLAY_START",
                "Overlay has no start_time and will fail to apply",
            ));
        }
        if matches!(params.duration, Some(d) if !(d.is_finite() && d > 0.0)) {
            errors.push(PlanIssue::validation(
                index,
                "INVALID_OVERLAY_DURATION",
                "Overlay duration must be positive",
            ));
        }
        if let (Some(start), Some(end)) = (params.start_time, params.end_time) {
            if end <= start {
                errors.push(PlanIssue::validation(
                    index,
                    "INVALID_OVERLAY_RANGE",
                    &format!("Overlay end_time {} must be after start_time {}", end, start),
                ));
            }
        }
    }
}

impl Default for TimelineValidator {
    fn default() -> Self {
        Self::new()
    }
}
