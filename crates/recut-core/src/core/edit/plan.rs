//! Edit Plan Module
//!
//! Defines the EditPlan schema produced by the upstream request classifier.
//! Operation parameters are a tagged union keyed by `operation_type`; every
//! parameter struct keeps unrecognized keys in an `extra` map so new fields
//! from the classifier survive a round trip.

use std::collections::BTreeSet;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::{TimeRange, TimeSec};

/// Highest accepted operation priority
pub const MAX_PRIORITY: u8 = 10;

/// Priority assigned when the classifier omits one
pub const DEFAULT_PRIORITY: u8 = 5;

// =============================================================================
// Operation Kinds
// =============================================================================

/// Operation type discriminant
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Trim,
    Crop,
    Split,
    Merge,
    Reorder,
    Swap,
    Overlay,
    Timing,
    Transition,
    Speed,
    Volume,
    Filter,
}

impl OperationType {
    pub const ALL: [OperationType; 12] = [
        OperationType::Trim,
        OperationType::Crop,
        OperationType::Split,
        OperationType::Merge,
        OperationType::Reorder,
        OperationType::Swap,
        OperationType::Overlay,
        OperationType::Timing,
        OperationType::Transition,
        OperationType::Speed,
        OperationType::Volume,
        OperationType::Filter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Trim => "trim",
            OperationType::Crop => "crop",
            OperationType::Split => "split",
            OperationType::Merge => "merge",
            OperationType::Reorder => "reorder",
            OperationType::Swap => "swap",
            OperationType::Overlay => "overlay",
            OperationType::Timing => "timing",
            OperationType::Transition => "transition",
            OperationType::Speed => "speed",
            OperationType::Volume => "volume",
            OperationType::Filter => "filter",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an operation is aimed at
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    #[default]
    Clip,
    Timeline,
    Audio,
    Visual,
    Transition,
}

// =============================================================================
// Operation Parameters
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrimParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<TimeSec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<TimeSec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<TimeSec>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CropParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitParams {
    /// Split point relative to the clip start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_time: Option<TimeSec>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeParams {
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReorderParams {
    /// New `sequence_order` values, positionally matching `target_clips`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_order: Option<Vec<i64>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SwapParams {
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Overlay anchor: a named position ("top_left") or normalized coordinates
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OverlayPosition {
    Anchor(String),
    Point { x: f64, y: f64 },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlayParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<OverlayPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<TimeSec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<TimeSec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<TimeSec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_offset: Option<TimeSec>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionParams {
    #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
    pub transition_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<TimeSec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub easing: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeedParams {
    /// Playback rate multiplier (1.0 = unchanged)
    #[serde(default, alias = "speed", skip_serializing_if = "Option::is_none")]
    pub factor: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeParams {
    /// Gain multiplier (1.0 = unchanged)
    #[serde(default, alias = "volume", skip_serializing_if = "Option::is_none")]
    pub level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_in: Option<TimeSec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_out: Option<TimeSec>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    #[serde(default, alias = "filter", skip_serializing_if = "Option::is_none")]
    pub filter_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Operation payload, discriminated by `operation_type`.
///
/// A missing or null `parameters` reads as `{}` so parameter checks are left
/// to the validator instead of failing the whole plan.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "operation_type", content = "parameters", rename_all = "snake_case")]
pub enum OperationParams {
    Trim(TrimParams),
    Crop(CropParams),
    Split(SplitParams),
    Merge(MergeParams),
    Reorder(ReorderParams),
    Swap(SwapParams),
    Overlay(OverlayParams),
    Timing(TimingParams),
    Transition(TransitionParams),
    Speed(SpeedParams),
    Volume(VolumeParams),
    Filter(FilterParams),
}

impl OperationParams {
    pub fn operation_type(&self) -> OperationType {
        match self {
            OperationParams::Trim(_) => OperationType::Trim,
            OperationParams::Crop(_) => OperationType::Crop,
            OperationParams::Split(_) => OperationType::Split,
            OperationParams::Merge(_) => OperationType::Merge,
            OperationParams::Reorder(_) => OperationType::Reorder,
            OperationParams::Swap(_) => OperationType::Swap,
            OperationParams::Overlay(_) => OperationType::Overlay,
            OperationParams::Timing(_) => OperationType::Timing,
            OperationParams::Transition(_) => OperationType::Transition,
            OperationParams::Speed(_) => OperationType::Speed,
            OperationParams::Volume(_) => OperationType::Volume,
            OperationParams::Filter(_) => OperationType::Filter,
        }
    }

    /// Builds the payload for `operation_type` from its raw parameters
    pub fn from_parts(
        operation_type: OperationType,
        parameters: Value,
    ) -> Result<Self, serde_json::Error> {
        use serde_json::from_value;

        Ok(match operation_type {
            OperationType::Trim => OperationParams::Trim(from_value(parameters)?),
            OperationType::Crop => OperationParams::Crop(from_value(parameters)?),
            OperationType::Split => OperationParams::Split(from_value(parameters)?),
            OperationType::Merge => OperationParams::Merge(from_value(parameters)?),
            OperationType::Reorder => OperationParams::Reorder(from_value(parameters)?),
            OperationType::Swap => OperationParams::Swap(from_value(parameters)?),
            OperationType::Overlay => OperationParams::Overlay(from_value(parameters)?),
            OperationType::Timing => OperationParams::Timing(from_value(parameters)?),
            OperationType::Transition => OperationParams::Transition(from_value(parameters)?),
            OperationType::Speed => OperationParams::Speed(from_value(parameters)?),
            OperationType::Volume => OperationParams::Volume(from_value(parameters)?),
            OperationType::Filter => OperationParams::Filter(from_value(parameters)?),
        })
    }

    /// Unrecognized keys the classifier attached to this operation
    pub fn extra(&self) -> &Map<String, Value> {
        match self {
            OperationParams::Trim(p) => &p.extra,
            OperationParams::Crop(p) => &p.extra,
            OperationParams::Split(p) => &p.extra,
            OperationParams::Merge(p) => &p.extra,
            OperationParams::Reorder(p) => &p.extra,
            OperationParams::Swap(p) => &p.extra,
            OperationParams::Overlay(p) => &p.extra,
            OperationParams::Timing(p) => &p.extra,
            OperationParams::Transition(p) => &p.extra,
            OperationParams::Speed(p) => &p.extra,
            OperationParams::Volume(p) => &p.extra,
            OperationParams::Filter(p) => &p.extra,
        }
    }
}

impl<'de> Deserialize<'de> for OperationParams {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Tagged {
            operation_type: OperationType,
            #[serde(default)]
            parameters: Option<Value>,
        }

        let tagged = Tagged::deserialize(deserializer)?;
        let parameters = match tagged.parameters {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(value) => value,
        };
        OperationParams::from_parts(tagged.operation_type, parameters).map_err(de::Error::custom)
    }
}

// =============================================================================
// EditOperation
// =============================================================================

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

/// A single abstract edit instruction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EditOperation {
    #[serde(flatten)]
    pub params: OperationParams,
    #[serde(default)]
    pub target_type: TargetType,
    /// Zero-based indices into the clips sorted by `sequence_order`
    #[serde(default)]
    pub target_clips: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_time_range: Option<TimeRange>,
    /// Advisory ordering hint, higher first (0-10)
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub description: String,
}

impl EditOperation {
    /// Creates a clip-targeted operation
    pub fn new(params: OperationParams, target_clips: Vec<usize>) -> Self {
        Self {
            params,
            target_type: TargetType::Clip,
            target_clips,
            target_time_range: None,
            priority: DEFAULT_PRIORITY,
            description: String::new(),
        }
    }

    pub fn operation_type(&self) -> OperationType {
        self.params.operation_type()
    }

    /// Trims a clip to a new duration, keeping its start
    pub fn trim_duration(clip: usize, duration: TimeSec) -> Self {
        Self::new(
            OperationParams::Trim(TrimParams {
                duration: Some(duration),
                ..Default::default()
            }),
            vec![clip],
        )
    }

    /// Trims a clip to explicit bounds
    pub fn trim_range(clip: usize, start_time: TimeSec, end_time: TimeSec) -> Self {
        Self::new(
            OperationParams::Trim(TrimParams {
                start_time: Some(start_time),
                end_time: Some(end_time),
                ..Default::default()
            }),
            vec![clip],
        )
    }

    /// Splits a clip at `split_time` seconds from its start
    pub fn split(clip: usize, split_time: TimeSec) -> Self {
        Self::new(
            OperationParams::Split(SplitParams {
                split_time: Some(split_time),
                ..Default::default()
            }),
            vec![clip],
        )
    }

    /// Reassigns playback positions of `clips`
    pub fn reorder(clips: Vec<usize>, new_order: Vec<i64>) -> Self {
        Self::new(
            OperationParams::Reorder(ReorderParams {
                new_order: Some(new_order),
                ..Default::default()
            }),
            clips,
        )
    }

    /// Swaps two clips
    pub fn swap(a: usize, b: usize) -> Self {
        Self::new(OperationParams::Swap(SwapParams::default()), vec![a, b])
    }

    /// Merges clips into one
    pub fn merge(clips: Vec<usize>) -> Self {
        Self::new(OperationParams::Merge(MergeParams::default()), clips)
    }

    /// Shifts clips in time
    pub fn timing(clips: Vec<usize>, time_offset: TimeSec) -> Self {
        Self::new(
            OperationParams::Timing(TimingParams {
                time_offset: Some(time_offset),
                ..Default::default()
            }),
            clips,
        )
    }

    /// Changes playback speed of a clip
    pub fn speed(clip: usize, factor: f64) -> Self {
        Self::new(
            OperationParams::Speed(SpeedParams {
                factor: Some(factor),
                ..Default::default()
            }),
            vec![clip],
        )
    }

    /// Changes the gain of a clip
    pub fn volume(clip: usize, level: f64) -> Self {
        Self::new(
            OperationParams::Volume(VolumeParams {
                level: Some(level),
                ..Default::default()
            }),
            vec![clip],
        )
    }

    /// Applies a named filter to a clip
    pub fn filter(clip: usize, filter_name: &str) -> Self {
        Self::new(
            OperationParams::Filter(FilterParams {
                filter_name: Some(filter_name.to_string()),
                ..Default::default()
            }),
            vec![clip],
        )
    }

    /// Places a transition between two adjacent clips
    pub fn transition(from: usize, to: usize, transition_type: &str, duration: TimeSec) -> Self {
        let mut op = Self::new(
            OperationParams::Transition(TransitionParams {
                transition_type: Some(transition_type.to_string()),
                duration: Some(duration),
                ..Default::default()
            }),
            vec![from, to],
        );
        op.target_type = TargetType::Transition;
        op
    }

    /// Adds a visual overlay
    pub fn overlay(params: OverlayParams) -> Self {
        let mut op = Self::new(OperationParams::Overlay(params), Vec::new());
        op.target_type = TargetType::Visual;
        op
    }

    /// Sets the target type
    pub fn with_target_type(mut self, target_type: TargetType) -> Self {
        self.target_type = target_type;
        self
    }

    /// Sets the priority, clamped to 0-10
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.min(MAX_PRIORITY);
        self
    }

    /// Sets the description
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Restricts the operation to a time window
    pub fn with_time_range(mut self, start: TimeSec, end: TimeSec) -> Self {
        self.target_time_range = Some(TimeRange::new(start, end));
        self
    }

    /// Distinct clip indices this operation touches
    pub fn distinct_targets(&self) -> BTreeSet<usize> {
        self.target_clips.iter().copied().collect()
    }
}

// =============================================================================
// EditPlan
// =============================================================================

/// Ordered operations derived from one natural-language request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EditPlan {
    pub operations: Vec<EditOperation>,
    #[serde(default)]
    pub natural_language_request: String,
    #[serde(default)]
    pub interpreted_intent: String,
    /// Classifier confidence (0-1)
    #[serde(default)]
    pub confidence_score: f64,
    #[serde(default)]
    pub safety_check_passed: bool,
    #[serde(default)]
    pub estimated_duration_seconds: TimeSec,
}

impl EditPlan {
    /// Creates an empty plan for a request
    pub fn new(request: &str) -> Self {
        Self {
            operations: Vec::new(),
            natural_language_request: request.to_string(),
            interpreted_intent: String::new(),
            confidence_score: 1.0,
            safety_check_passed: true,
            estimated_duration_seconds: 0.0,
        }
    }

    /// Adds an operation to the plan
    pub fn add_operation(mut self, operation: EditOperation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Sets the interpreted intent
    pub fn with_intent(mut self, intent: &str) -> Self {
        self.interpreted_intent = intent.to_string();
        self
    }

    /// Sets the classifier confidence, clamped to 0-1
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence_score = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    /// Returns a copy whose operations run highest priority first.
    /// Equal priorities keep plan order.
    pub fn sorted_by_priority(&self) -> Self {
        let mut sorted = self.clone();
        sorted
            .operations
            .sort_by(|a, b| b.priority.cmp(&a.priority));
        sorted
    }

    /// Every clip index referenced by any operation
    pub fn touched_clips(&self) -> BTreeSet<usize> {
        self.operations
            .iter()
            .flat_map(|op| op.target_clips.iter().copied())
            .collect()
    }

    /// One-line human summary used when submitting a recomposition
    pub fn summary(&self) -> String {
        if !self.interpreted_intent.trim().is_empty() {
            return self.interpreted_intent.clone();
        }

        let parts: Vec<String> = self
            .operations
            .iter()
            .map(|op| {
                if op.description.is_empty() {
                    op.operation_type().to_string()
                } else {
                    op.description.clone()
                }
            })
            .collect();

        if parts.is_empty() {
            self.natural_language_request.clone()
        } else {
            parts.join("; ")
        }
    }
}
