//! Label-indexed velocity tracker.
//!
//! Keeps exactly one [`VelocitySample`] per label and derives an
//! instantaneous image-space velocity each time the label is seen again.
//! Tracking is per label, not per instance: with at most a handful of
//! hazards on screen this is accurate enough, and it needs no association
//! step.
//!
//! ```text
//! dx = (mid_x − last_mid_x) / dt
//! dy = (mid_y − last_mid_y) / dt
//! approach_speed = −dy
//! ```
//!
//! # Example
//!
//! ```rust
//! use wayguard_perception::velocity::{VelocityReading, VelocityTracker};
//! use wayguard_types::NormalizedRect;
//!
//! let mut tracker = VelocityTracker::new(0.015);
//! tracker.observe("car", &NormalizedRect::centered(0.5, 0.6, 0.2, 0.2), 0.0);
//! let reading = tracker.observe("car", &NormalizedRect::centered(0.5, 0.5, 0.2, 0.2), 1.0);
//!
//! match reading {
//!     VelocityReading::Measured(m) => assert!(m.is_approaching),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

use std::collections::HashMap;

use wayguard_types::NormalizedRect;

/// Last observation of a label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocitySample {
    pub last_bbox: NormalizedRect,
    /// Seconds on the engine clock.
    pub last_timestamp: f64,
}

/// Instantaneous image-space motion of a label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    /// Horizontal midpoint velocity (frame widths per second).
    pub dx: f32,
    /// Vertical midpoint velocity (frame heights per second).
    pub dy: f32,
    /// `−dy`.  With the bottom-left origin a midpoint sliding down the
    /// frame is getting closer, so positive means approaching.
    pub approach_speed: f32,
    pub is_approaching: bool,
}

impl Motion {
    /// `true` when the horizontal speed exceeds `threshold`.
    pub fn is_crossing(&self, threshold: f32) -> bool {
        self.dx.abs() > threshold
    }
}

/// Outcome of one [`VelocityTracker::observe`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VelocityReading {
    /// First sighting of the label; nothing to compare against.
    First,
    /// A prior sample exists but `dt ≤ 0`.
    Skipped,
    Measured(Motion),
    /// The computation produced NaN/∞.  The caller must discard the
    /// candidate.
    NonFinite,
}

impl VelocityReading {
    pub fn motion(&self) -> Option<Motion> {
        match self {
            VelocityReading::Measured(m) => Some(*m),
            _ => None,
        }
    }
}

/// Per-label motion memory.
#[derive(Debug)]
pub struct VelocityTracker {
    approach_threshold: f32,
    samples: HashMap<String, VelocitySample>,
}

impl VelocityTracker {
    /// `approach_threshold` is the approach speed above which a label counts
    /// as approaching (`0.015` by default).
    pub fn new(approach_threshold: f32) -> Self {
        Self {
            approach_threshold,
            samples: HashMap::new(),
        }
    }

    /// Record `bbox` for `label` at `now` and compare it with the previous
    /// sample.  The stored sample is always overwritten.
    pub fn observe(&mut self, label: &str, bbox: &NormalizedRect, now: f64) -> VelocityReading {
        let previous = self.samples.insert(
            label.to_string(),
            VelocitySample {
                last_bbox: *bbox,
                last_timestamp: now,
            },
        );
        let Some(prev) = previous else {
            return VelocityReading::First;
        };

        let dt = now - prev.last_timestamp;
        if dt.is_nan() || dt <= 0.0 {
            return VelocityReading::Skipped;
        }
        let dt = dt as f32;
        let dx = (bbox.mid_x() - prev.last_bbox.mid_x()) / dt;
        let dy = (bbox.mid_y() - prev.last_bbox.mid_y()) / dt;
        if !dx.is_finite() || !dy.is_finite() {
            return VelocityReading::NonFinite;
        }

        let approach_speed = -dy;
        VelocityReading::Measured(Motion {
            dx,
            dy,
            approach_speed,
            is_approaching: approach_speed > self.approach_threshold,
        })
    }

    pub fn sample(&self, label: &str) -> Option<&VelocitySample> {
        self.samples.get(label)
    }

    /// Drop samples older than `max_age` seconds so labels that left the
    /// scene do not produce a huge `dt` when they return.
    pub fn forget_stale(&mut self, now: f64, max_age: f64) {
        self.samples.retain(|_, s| now - s.last_timestamp <= max_age);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Default for VelocityTracker {
    fn default() -> Self {
        Self::new(0.015)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(mid_x: f32, mid_y: f32) -> NormalizedRect {
        NormalizedRect::centered(mid_x, mid_y, 0.2, 0.2)
    }

    #[test]
    fn first_sighting_has_no_motion() {
        let mut t = VelocityTracker::default();
        assert_eq!(t.observe("car", &at(0.5, 0.5), 0.0), VelocityReading::First);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn sinking_midpoint_is_approaching() {
        let mut t = VelocityTracker::default();
        t.observe("car", &at(0.5, 0.6), 0.0);
        let m = t.observe("car", &at(0.5, 0.55), 0.5).motion().unwrap();
        // dy = -0.05 / 0.5 = -0.1 → approach 0.1
        assert!((m.approach_speed - 0.1).abs() < 1e-4);
        assert!(m.is_approaching);
    }

    #[test]
    fn rising_midpoint_is_not_approaching() {
        let mut t = VelocityTracker::default();
        t.observe("car", &at(0.5, 0.5), 0.0);
        let m = t.observe("car", &at(0.5, 0.6), 1.0).motion().unwrap();
        assert!(m.approach_speed < 0.0);
        assert!(!m.is_approaching);
    }

    #[test]
    fn slow_approach_below_threshold() {
        let mut t = VelocityTracker::default();
        t.observe("dog", &at(0.5, 0.5), 0.0);
        // 0.01 over 1 s → 0.01 < 0.015
        let m = t.observe("dog", &at(0.5, 0.49), 1.0).motion().unwrap();
        assert!(!m.is_approaching);
    }

    #[test]
    fn lateral_motion_is_crossing() {
        let mut t = VelocityTracker::default();
        t.observe("bicycle", &at(0.3, 0.5), 0.0);
        let m = t.observe("bicycle", &at(0.5, 0.5), 1.0).motion().unwrap();
        assert!((m.dx - 0.2).abs() < 1e-4);
        assert!(m.is_crossing(0.015));
        assert!(!m.is_approaching);
    }

    #[test]
    fn non_positive_dt_is_skipped_but_sample_overwritten() {
        let mut t = VelocityTracker::default();
        t.observe("car", &at(0.5, 0.5), 1.0);
        assert_eq!(t.observe("car", &at(0.4, 0.5), 1.0), VelocityReading::Skipped);
        assert_eq!(t.observe("car", &at(0.3, 0.5), 0.5), VelocityReading::Skipped);
        let s = t.sample("car").unwrap();
        assert!((s.last_bbox.mid_x() - 0.3).abs() < 1e-6);
        assert_eq!(s.last_timestamp, 0.5);
    }

    #[test]
    fn labels_are_tracked_independently() {
        let mut t = VelocityTracker::default();
        t.observe("car", &at(0.5, 0.5), 0.0);
        assert_eq!(t.observe("bus", &at(0.5, 0.4), 1.0), VelocityReading::First);
        assert!(t.observe("car", &at(0.5, 0.4), 1.0).motion().is_some());
    }

    #[test]
    fn tiny_dt_overflow_is_non_finite() {
        let mut t = VelocityTracker::default();
        t.observe("car", &at(0.2, 0.5), 0.0);
        assert_eq!(
            t.observe("car", &at(0.8, 0.5), 1e-300),
            VelocityReading::NonFinite
        );
    }

    #[test]
    fn forget_stale_drops_old_samples() {
        let mut t = VelocityTracker::default();
        t.observe("car", &at(0.5, 0.5), 0.0);
        t.observe("bus", &at(0.5, 0.5), 4.0);
        t.forget_stale(5.0, 2.0);
        assert!(t.sample("car").is_none());
        assert!(t.sample("bus").is_some());
    }
}
