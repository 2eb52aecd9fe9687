//! Spatial Projector.
//!
//! Converts a hazard into the camera-relative offset the renderer places its
//! marker at.  No rendering happens here and no camera intrinsics are used:
//!
//! - lateral target: horizontal box offset `mid_x − 0.5`, read as metres at
//!   the nominal 2 m engagement distance and clamped to the lifecycle side
//!   limit (±0.5 m);
//! - distance target: the resolved distance clamped to the lifecycle
//!   distance bounds (`[1, 4]` m), or 2 m when unknown;
//! - placement: `forward = 2 m`, `lateral = smoothed side`,
//!   `vertical = −0.5 m` so markers stay in view when the phone tilts.

use serde::{Deserialize, Serialize};
use wayguard_types::{FusedHazard, NormalizedRect, Placement};

use crate::lifecycle::{ActiveHazard, HazardTarget, LifecycleConfig};

/// Projection constants.  Side and distance bounds come from
/// [`LifecycleConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorConfig {
    /// Fixed placement distance in front of the camera.
    pub forward_m: f32,
    /// Vertical offset relative to eye level.
    pub vertical_m: f32,
    /// Distance target used when the hazard's distance is unknown.
    pub default_distance_m: f32,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            forward_m: 2.0,
            vertical_m: -0.5,
            default_distance_m: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpatialProjector {
    config: ProjectorConfig,
    side_limit_m: f32,
    min_distance_m: f32,
    max_distance_m: f32,
}

impl Default for SpatialProjector {
    fn default() -> Self {
        Self::new(ProjectorConfig::default(), &LifecycleConfig::default())
    }
}

impl SpatialProjector {
    /// `bounds` supplies the side limit and distance range shared with the
    /// lifecycle tracker.  Non-finite or inverted bounds are repaired so
    /// projection never panics.
    pub fn new(config: ProjectorConfig, bounds: &LifecycleConfig) -> Self {
        let side_limit_m = if bounds.side_limit_m.is_finite() {
            bounds.side_limit_m.abs()
        } else {
            0.0
        };
        let min_distance_m = finite_or(bounds.min_distance_m, 0.0);
        let max_distance_m = finite_or(bounds.max_distance_m, f32::MAX).max(min_distance_m);
        Self {
            config,
            side_limit_m,
            min_distance_m,
            max_distance_m,
        }
    }

    pub fn target_side(&self, bbox: &NormalizedRect) -> f32 {
        (bbox.mid_x() - 0.5).clamp(-self.side_limit_m, self.side_limit_m)
    }

    pub fn target_distance(&self, distance: Option<f32>) -> f32 {
        match distance {
            Some(d) if d.is_finite() => d.clamp(self.min_distance_m, self.max_distance_m),
            _ => self.config.default_distance_m,
        }
    }

    /// Unsmoothed target of a fused hazard.
    pub fn target(&self, hazard: &FusedHazard) -> HazardTarget {
        HazardTarget {
            side: self.target_side(&hazard.bbox),
            distance: self.target_distance(hazard.distance),
        }
    }

    /// Placement of a tracked hazard.
    pub fn place(&self, active: &ActiveHazard) -> Placement {
        Placement {
            forward: self.config.forward_m,
            lateral: active.smoothed_side,
            vertical: self.config.vertical_m,
        }
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() { value } else { fallback }
}
