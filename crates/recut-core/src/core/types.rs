//! Recut Core Type Definitions
//!
//! Defines fundamental types used throughout the crate.

use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Clip unique identifier
pub type ClipId = String;

/// Clip generation (batch of generated clips) identifier
pub type GenerationId = String;

/// Scene identifier
pub type SceneId = String;

/// Composition identifier (the render-side project)
pub type CompositionId = String;

/// Recomposition record identifier (ULID)
pub type RecompositionId = String;

/// Rendering backend job identifier
pub type RenderJobId = String;

// =============================================================================
// Time Types
// =============================================================================

/// Time in seconds (floating point)
pub type TimeSec = f64;

/// Tolerance used when comparing clip durations against their bounds.
pub const DURATION_TOLERANCE_SEC: TimeSec = 0.01;

/// Returns true when two times are equal within `tolerance`.
pub fn approx_eq(a: TimeSec, b: TimeSec, tolerance: TimeSec) -> bool {
    (a - b).abs() <= tolerance
}

// =============================================================================
// Time Range
// =============================================================================

/// Window on the timeline an operation is restricted to
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: TimeSec,
    pub end: TimeSec,
}

impl TimeRange {
    /// Bounds are kept as given; inverted ranges are reported by validation
    pub fn new(start: TimeSec, end: TimeSec) -> Self {
        Self { start, end }
    }

    /// Finite, non-negative and non-empty
    pub fn is_valid(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start >= 0.0 && self.start < self.end
    }
}

// =============================================================================
// Render Types
// =============================================================================

/// Output resolution in pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 1080p landscape
    pub fn fhd() -> Self {
        Self::new(1920, 1080)
    }

    /// 1080p portrait (shorts/reels)
    pub fn portrait() -> Self {
        Self::new(1080, 1920)
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::fhd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range_validity() {
        assert!(TimeRange::new(0.0, 5.0).is_valid());
        assert!(!TimeRange::new(10.0, 5.0).is_valid());
        assert!(!TimeRange::new(4.0, 4.0).is_valid());
        assert!(!TimeRange::new(-1.0, 2.0).is_valid());
        assert!(!TimeRange::new(0.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn test_approx_eq_uses_tolerance() {
        assert!(approx_eq(3.0, 3.005, DURATION_TOLERANCE_SEC));
        assert!(!approx_eq(3.0, 3.02, DURATION_TOLERANCE_SEC));
    }
}
