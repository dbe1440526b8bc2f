//! Timeline Model Definitions
//!
//! Defines the generated Clip and helpers over an ordered clip collection.

use serde::{Deserialize, Serialize};

use crate::core::{approx_eq, ClipId, GenerationId, SceneId, TimeSec};

// =============================================================================
// Clip Status
// =============================================================================

/// Storage status of a generated clip (owned by the clip store)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipStatus {
    #[default]
    Pending,
    Generating,
    Ready,
    Failed,
}

// =============================================================================
// Clip
// =============================================================================

/// A single generated video segment placed on the timeline
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub clip_id: ClipId,
    pub generation_id: GenerationId,
    pub scene_id: SceneId,
    /// Playback position, unique within a generation
    pub sequence_order: i64,
    pub start_time_seconds: TimeSec,
    pub end_time_seconds: TimeSec,
    pub duration_seconds: TimeSec,
    /// Storage location, written by the clip store only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_url: Option<String>,
    #[serde(default)]
    pub status: ClipStatus,
}

impl Clip {
    /// Creates a clip spanning `[start, start + duration)`
    pub fn new(
        clip_id: impl Into<ClipId>,
        generation_id: impl Into<GenerationId>,
        sequence_order: i64,
        start: TimeSec,
        duration: TimeSec,
    ) -> Self {
        Self {
            clip_id: clip_id.into(),
            generation_id: generation_id.into(),
            scene_id: String::new(),
            sequence_order,
            start_time_seconds: start,
            end_time_seconds: start + duration,
            duration_seconds: duration,
            storage_url: None,
            status: ClipStatus::Ready,
        }
    }

    /// Sets the scene id
    pub fn with_scene(mut self, scene_id: impl Into<SceneId>) -> Self {
        self.scene_id = scene_id.into();
        self
    }

    /// Duration derived from the timing bounds
    pub fn span(&self) -> TimeSec {
        self.end_time_seconds - self.start_time_seconds
    }

    /// Whether the stored duration matches `end - start` within `tolerance`
    pub fn has_consistent_duration(&self, tolerance: TimeSec) -> bool {
        approx_eq(self.duration_seconds, self.span(), tolerance)
    }

    /// Moves the clip in time without changing its length
    pub fn shift_by(&mut self, offset: TimeSec) {
        self.start_time_seconds += offset;
        self.end_time_seconds += offset;
    }

    /// Recomputes the stored duration from the bounds
    pub fn sync_duration(&mut self) {
        self.duration_seconds = self.span();
    }
}

// =============================================================================
// Collection Helpers
// =============================================================================

/// Sorts clips by playback position. Stable, so equal positions keep input order.
pub fn sort_by_sequence(clips: &mut [Clip]) {
    clips.sort_by_key(|clip| clip.sequence_order);
}

/// Returns the end of the last clip, or 0 for an empty timeline
pub fn total_duration(clips: &[Clip]) -> TimeSec {
    clips
        .iter()
        .map(|clip| clip.end_time_seconds)
        .fold(0.0, TimeSec::max)
}
