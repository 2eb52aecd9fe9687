//! Time gates for the per-tick loop.
//!
//! - [`CadenceGate`] decides when spatial output is recomputed: at most every
//!   `min_interval_s`, unless the user turns by `heading_threshold_deg` or
//!   more, in which case the display follows the turn immediately.
//! - [`DetectionThrottle`] keeps the detector from being invoked more often
//!   than its minimum interval.
//!
//! Both take the engine clock (seconds) explicitly so replays and tests can
//! drive them with simulated time.

use serde::{Deserialize, Serialize};

/// Parameters of the [`CadenceGate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    pub min_interval_s: f64,
    pub heading_threshold_deg: f32,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            min_interval_s: 0.20,
            heading_threshold_deg: 5.0,
        }
    }
}

/// Smallest absolute difference between two compass headings, in `[0, 180]`.
pub fn heading_delta_deg(a: f32, b: f32) -> f32 {
    let d = (a - b).rem_euclid(360.0);
    if d > 180.0 { 360.0 - d } else { d }
}

/// Gate on spatial recomputation.
#[derive(Debug)]
pub struct CadenceGate {
    config: CadenceConfig,
    last_update: Option<f64>,
    last_heading: Option<f32>,
}

impl CadenceGate {
    pub fn new(config: CadenceConfig) -> Self {
        Self {
            config,
            last_update: None,
            last_heading: None,
        }
    }

    /// Returns `true` (and records `now`/`heading_deg` as the last
    /// recompute) when enough time has passed or the heading has changed
    /// enough.  The very first call always opens the gate.
    ///
    /// A non-finite heading never counts as a turn.
    pub fn should_recompute(&mut self, now: f64, heading_deg: f32) -> bool {
        let Some(last) = self.last_update else {
            self.record(now, heading_deg);
            return true;
        };

        let elapsed = now - last >= self.config.min_interval_s;
        let turned = match self.last_heading {
            Some(prev) if heading_deg.is_finite() => {
                heading_delta_deg(heading_deg, prev) >= self.config.heading_threshold_deg
            }
            _ => false,
        };

        if elapsed || turned {
            self.record(now, heading_deg);
            true
        } else {
            false
        }
    }

    /// Forget the last recompute so the next call opens the gate.
    pub fn reset(&mut self) {
        self.last_update = None;
        self.last_heading = None;
    }

    fn record(&mut self, now: f64, heading_deg: f32) {
        self.last_update = Some(now);
        if heading_deg.is_finite() {
            self.last_heading = Some(heading_deg);
        }
    }
}

/// Minimum-interval throttle for detector invocations.
#[derive(Debug)]
pub struct DetectionThrottle {
    min_interval_s: f64,
    last_invocation: Option<f64>,
}

impl DetectionThrottle {
    pub fn new(min_interval_s: f64) -> Self {
        Self {
            min_interval_s: min_interval_s.max(0.0),
            last_invocation: None,
        }
    }

    /// `true` when the detector may run at `now`; the invocation is then
    /// recorded.  A clock that jumps backwards re-arms the throttle.
    pub fn try_acquire(&mut self, now: f64) -> bool {
        match self.last_invocation {
            Some(last) if now >= last && now - last < self.min_interval_s => false,
            _ => {
                self.last_invocation = Some(now);
                true
            }
        }
    }
}
