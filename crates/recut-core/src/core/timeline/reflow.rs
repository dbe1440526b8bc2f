//! Timeline Reflow
//!
//! Normalizes a clip collection after mutation so clips are ordered by
//! `sequence_order`, contiguous from zero, and free of gaps and overlaps.
//! Each clip keeps its own length; only its position in time moves.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::{sort_by_sequence, total_duration, Clip};
use crate::core::{TimeSec, DURATION_TOLERANCE_SEC};

/// Summary of what a reflow pass changed
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReflowReport {
    /// Clips whose negative start was clamped to zero
    pub clamped: usize,
    /// Clips moved forward to close an overlap
    pub shifted_forward: usize,
    /// Clips moved backward to close a gap
    pub shifted_backward: usize,
    /// Clips whose stored duration disagreed with their bounds
    pub durations_corrected: usize,
    /// Timeline length after reflow
    pub total_duration: TimeSec,
}

impl ReflowReport {
    /// Whether the pass left every clip untouched
    pub fn is_unchanged(&self) -> bool {
        self.clamped == 0
            && self.shifted_forward == 0
            && self.shifted_backward == 0
            && self.durations_corrected == 0
    }
}

/// Reflows clips in place using the default duration tolerance
pub fn reflow(clips: &mut [Clip]) -> ReflowReport {
    reflow_with_tolerance(clips, DURATION_TOLERANCE_SEC)
}

/// Reflows clips in place; `tolerance` bounds the accepted drift between a
/// clip's stored duration and `end - start` before it is reported as corrected.
pub fn reflow_with_tolerance(clips: &mut [Clip], tolerance: TimeSec) -> ReflowReport {
    let mut report = ReflowReport::default();

    sort_by_sequence(clips);

    for clip in clips.iter_mut() {
        if clip.start_time_seconds < 0.0 {
            let offset = -clip.start_time_seconds;
            clip.shift_by(offset);
            report.clamped += 1;
        }
    }

    let mut cursor: TimeSec = 0.0;
    for clip in clips.iter_mut() {
        if clip.start_time_seconds < cursor {
            clip.shift_by(cursor - clip.start_time_seconds);
            report.shifted_forward += 1;
        } else if clip.start_time_seconds > cursor {
            clip.shift_by(cursor - clip.start_time_seconds);
            report.shifted_backward += 1;
        }
        // Snap exactly so a second pass sees start == cursor.
        clip.start_time_seconds = cursor;
        cursor = clip.end_time_seconds;
    }

    for clip in clips.iter_mut() {
        if !clip.has_consistent_duration(tolerance) {
            debug!(
                "Correcting duration of clip {}: stored {:.3}s, bounds give {:.3}s",
                clip.clip_id,
                clip.duration_seconds,
                clip.span()
            );
            report.durations_corrected += 1;
        }
        clip.sync_duration();
    }

    report.total_duration = total_duration(clips);
    report
}
