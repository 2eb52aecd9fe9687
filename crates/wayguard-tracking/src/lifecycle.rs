//! [`LifecycleTracker`] – temporal stability for ranked hazards.
//!
//! Every hazard id moves through a small state machine:
//!
//! ```text
//! absent ──first sighting──▶ active ──timeout / left top-K──▶ evicted ──▶ absent
//!                             ▲   │
//!                             └───┘ refreshed (EMA-smoothed)
//! ```
//!
//! The tracker is the only writer of [`ActiveHazard`] state.  Call
//! [`LifecycleTracker::update`] with the current top-K targets on frames that
//! carry fresh detections, and [`LifecycleTracker::sweep_expired`] on frames
//! that do not.
//!
//! # Example
//!
//! ```
//! use wayguard_tracking::lifecycle::{HazardState, HazardTarget, LifecycleConfig, LifecycleTracker};
//!
//! let mut tracker = LifecycleTracker::new(LifecycleConfig::default());
//! let target = HazardTarget { side: 0.2, distance: 3.0 };
//! tracker.update(&[("car".to_string(), target)], 0.0);
//!
//! assert_eq!(tracker.state("car"), HazardState::Active);
//! let removed = tracker.sweep_expired(2.0);
//! assert_eq!(removed, vec!["car".to_string()]);
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Lifecycle parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// EMA weight of the new target (`smoothed = α·target + (1−α)·smoothed`).
    pub alpha: f32,
    /// Seconds an id may go unseen before it is evicted.
    pub eviction_timeout_s: f64,
    /// Bound on `|smoothed_side|` in metres.
    pub side_limit_m: f32,
    pub min_distance_m: f32,
    pub max_distance_m: f32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            alpha: 0.25,
            eviction_timeout_s: 1.2,
            side_limit_m: 0.5,
            min_distance_m: 1.0,
            max_distance_m: 4.0,
        }
    }
}

/// Where a hazard should be this frame, before smoothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HazardTarget {
    /// Lateral offset in metres, negative to the left.
    pub side: f32,
    /// Distance in metres.
    pub distance: f32,
}

/// Tracked state of one hazard id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveHazard {
    /// Engine-clock seconds of the last refresh.
    pub last_seen: f64,
    pub smoothed_side: f32,
    pub smoothed_distance: f32,
}

/// Externally visible state of an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HazardState {
    Active,
    /// Never seen, or already evicted.
    Absent,
}

// ────────────────────────────────────────────────────────────────────────────
// LifecycleTracker
// ────────────────────────────────────────────────────────────────────────────

/// Exclusively owned store of [`ActiveHazard`]s keyed by hazard id.
#[derive(Debug)]
pub struct LifecycleTracker {
    config: LifecycleConfig,
    entries: HashMap<String, ActiveHazard>,
}

impl LifecycleTracker {
    pub fn new(config: LifecycleConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Refresh or create an entry for every target, then evict every entry
    /// that is not in `targets` or whose timeout has passed.
    ///
    /// Returns the evicted ids, sorted.
    pub fn update(&mut self, targets: &[(String, HazardTarget)], now: f64) -> Vec<String> {
        let mut current: HashSet<&str> = HashSet::with_capacity(targets.len());

        for (id, target) in targets {
            if !target.side.is_finite() || !target.distance.is_finite() {
                warn!(id = %id, "ignoring non-finite hazard target");
                continue;
            }
            let target = self.bounded(*target);
            current.insert(id.as_str());

            match self.entries.get_mut(id) {
                Some(entry) => {
                    let a = self.config.alpha;
                    entry.last_seen = now;
                    entry.smoothed_side = a * target.side + (1.0 - a) * entry.smoothed_side;
                    entry.smoothed_distance =
                        a * target.distance + (1.0 - a) * entry.smoothed_distance;
                }
                None => {
                    debug!(id = %id, "hazard became active");
                    self.entries.insert(
                        id.clone(),
                        ActiveHazard {
                            last_seen: now,
                            smoothed_side: target.side,
                            smoothed_distance: target.distance,
                        },
                    );
                }
            }
        }

        let timeout = self.config.eviction_timeout_s;
        self.evict_where(|id, entry| !current.contains(id) || now - entry.last_seen > timeout)
    }

    /// Evict only the entries whose timeout has passed.  Used on ticks that
    /// carry no fresh detections.
    pub fn sweep_expired(&mut self, now: f64) -> Vec<String> {
        let timeout = self.config.eviction_timeout_s;
        self.evict_where(|_, entry| now - entry.last_seen > timeout)
    }

    /// Evict everything.
    pub fn clear(&mut self) -> Vec<String> {
        self.evict_where(|_, _| true)
    }

    pub fn get(&self, id: &str) -> Option<&ActiveHazard> {
        self.entries.get(id)
    }

    pub fn state(&self, id: &str) -> HazardState {
        if self.entries.contains_key(id) {
            HazardState::Active
        } else {
            HazardState::Absent
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ── helpers ─────────────────────────────────────────────────────────────

    /// Clamp `target` into the configured bounds.  `f32::max`/`min` ignore a
    /// NaN bound instead of panicking the way `clamp` would.
    fn bounded(&self, target: HazardTarget) -> HazardTarget {
        let limit = self.config.side_limit_m.abs();
        HazardTarget {
            side: target.side.max(-limit).min(limit),
            distance: target
                .distance
                .max(self.config.min_distance_m)
                .min(self.config.max_distance_m),
        }
    }

    fn evict_where(&mut self, mut evict: impl FnMut(&str, &ActiveHazard) -> bool) -> Vec<String> {
        let mut removed: Vec<String> = self
            .entries
            .iter()
            .filter(|(id, entry)| evict(id.as_str(), *entry))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &removed {
            self.entries.remove(id);
        }
        removed.sort();
        if !removed.is_empty() {
            debug!(ids = ?removed, "hazards evicted");
        }
        removed
    }
}
