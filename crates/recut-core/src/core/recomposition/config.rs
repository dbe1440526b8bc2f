//! Recomposition Config Definitions
//!
//! The composition configuration the rendering backend works from, and the
//! diff structure produced from an EditPlan.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::edit::OverlayPosition;
use crate::core::{CompositionId, GenerationId, Resolution, TimeSec};

/// Frame rate assumed when a composition does not state one
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

fn default_frame_rate() -> f64 {
    DEFAULT_FRAME_RATE
}

// =============================================================================
// Composition Config
// =============================================================================

/// Rendering configuration of an existing composition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompositionConfig {
    #[serde(default)]
    pub duration_seconds: TimeSec,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
    /// Backend-specific fields carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompositionConfig {
    pub fn new(duration_seconds: TimeSec, resolution: Resolution, frame_rate: f64) -> Self {
        Self {
            duration_seconds,
            resolution,
            frame_rate,
            extra: Map::new(),
        }
    }
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self::new(0.0, Resolution::default(), DEFAULT_FRAME_RATE)
    }
}

/// Explicit top-level render overrides
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<TimeSec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<f64>,
}

/// Effective top-level render settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub duration_seconds: TimeSec,
    pub resolution: Resolution,
    pub frame_rate: f64,
}

impl RenderSettings {
    /// Inherits from `original` unless overridden
    pub fn resolve(original: &CompositionConfig, overrides: &RenderOverrides) -> Self {
        Self {
            duration_seconds: overrides
                .duration_seconds
                .unwrap_or(original.duration_seconds),
            resolution: overrides.resolution.unwrap_or(original.resolution),
            frame_rate: overrides.frame_rate.unwrap_or(original.frame_rate),
        }
    }
}

// =============================================================================
// Edit Instructions
// =============================================================================

/// Changed fields for one clip; unset fields are left as rendered before
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipEditInstruction {
    pub clip_index: usize,
    /// Operation the instruction came from
    pub operation_index: usize,
    /// New end, as an offset from the clip start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_end: Option<TimeSec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<TimeSec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_in: Option<TimeSec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_out: Option<TimeSec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl ClipEditInstruction {
    /// True when no field would change the clip
    pub fn is_empty(&self) -> bool {
        self.trim_end.is_none()
            && self.duration.is_none()
            && self.speed.is_none()
            && self.volume.is_none()
            && self.fade_in.is_none()
            && self.fade_out.is_none()
            && self.filter.is_none()
    }
}

/// Transition between two clips
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionEditInstruction {
    pub from_clip: usize,
    pub to_clip: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<TimeSec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub easing: Option<String>,
}

/// Overlay keyed by its id
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayEditInstruction {
    pub overlay_id: String,
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
}

// =============================================================================
// Updated Composition Config
// =============================================================================

/// Diff submitted to the rendering backend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdatedCompositionConfig {
    pub composition_id: CompositionId,
    pub generation_id: GenerationId,
    #[serde(default)]
    pub clip_edits: Vec<ClipEditInstruction>,
    #[serde(default)]
    pub transition_edits: Vec<TransitionEditInstruction>,
    #[serde(default)]
    pub overlay_edits: Vec<OverlayEditInstruction>,
    pub render_settings: RenderSettings,
    /// Pre-edit configuration, kept for rollback
    pub original_config: CompositionConfig,
}

impl UpdatedCompositionConfig {
    /// A config with no edits that re-renders `original` as is
    pub fn restoring(
        composition_id: &str,
        generation_id: &str,
        original: CompositionConfig,
    ) -> Self {
        Self {
            composition_id: composition_id.to_string(),
            generation_id: generation_id.to_string(),
            clip_edits: Vec::new(),
            transition_edits: Vec::new(),
            overlay_edits: Vec::new(),
            render_settings: RenderSettings::resolve(&original, &RenderOverrides::default()),
            original_config: original,
        }
    }

    pub fn edit_count(&self) -> usize {
        self.clip_edits.len() + self.transition_edits.len() + self.overlay_edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edit_count() == 0
    }
}
