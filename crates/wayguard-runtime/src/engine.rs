//! [`HazardEngine`] – the per-tick hazard pipeline.
//!
//! Each frame with fresh detections runs:
//!
//! 1. **Normalize** – raw detector output becomes [`Candidate`]s.
//! 2. **Filter** – relevance/size, then distance resolution through the
//!    [`DepthResolver`], then contextual suppression, crowd clustering and the
//!    forward cone.
//! 3. **Velocity** – one observation per label; labels whose motion is
//!    non-finite are discarded.
//! 4. **Rank** – score, stable sort, truncate to the top K.
//! 5. **Fuse** – backend confirmations and motion boosts, re-sort, assign ids.
//! 6. **Lifecycle** – EMA-smooth the targets and evict ids that left.
//! 7. **Project** – placements, recomputed only when the cadence gate opens.
//!
//! Frames without fresh detections go through [`HazardEngine::idle`], which
//! only sweeps timed-out hazards and re-projects when the gate opens.
//!
//! # Example
//!
//! ```
//! use wayguard_perception::{RawDetection, TieredDepthResolver};
//! use wayguard_runtime::config::EngineConfig;
//! use wayguard_runtime::engine::{FrameInput, HazardEngine};
//! use wayguard_types::{BackendConfirmation, MotionSample};
//!
//! let mut engine =
//!     HazardEngine::new(EngineConfig::default(), Box::new(TieredDepthResolver::new()))?;
//! let frame = FrameInput {
//!     captured_at: 0.0,
//!     detections: vec![RawDetection::new("car", [0.4, 0.4, 0.2, 0.2], 0.9).with_distance(5.0)],
//!     confirmation: BackendConfirmation::empty(),
//!     motion: MotionSample { speed_mps: Some(1.2), heading_deg: 0.0 },
//! };
//! let out = engine.process(&frame, 0.0);
//! assert_eq!(out.hazards.len(), 1);
//! assert_eq!(out.hazards[0].explanation, "Vehicle ahead");
//! # Ok::<(), wayguard_types::HazardError>(())
//! ```

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};
use wayguard_perception::depth::resolve_distances;
use wayguard_perception::filter::{cluster_crowds, forward_cone, relevance_filter, suppress_contextual};
use wayguard_perception::fusion::fuse;
use wayguard_perception::normalize::normalize_detections;
use wayguard_perception::severity::rank;
use wayguard_perception::{DepthResolver, Motion, RawDetection, VelocityReading, VelocityTracker};
use wayguard_tracking::{CadenceGate, LifecycleTracker, SpatialProjector};
use wayguard_types::{
    BackendConfirmation, Candidate, FusedHazard, HazardError, HazardOutput, MotionSample,
    Placement,
};

use crate::config::EngineConfig;

// ────────────────────────────────────────────────────────────────────────────
// Inputs and outputs
// ────────────────────────────────────────────────────────────────────────────

/// One frame's worth of fresh input.
#[derive(Debug, Clone, Default)]
pub struct FrameInput {
    /// Engine-clock seconds at which the detector was queried.
    pub captured_at: f64,
    pub detections: Vec<RawDetection>,
    pub confirmation: BackendConfirmation,
    pub motion: MotionSample,
}

/// What a tick hands to the renderer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutput {
    /// Ordered by severity, highest first; never more than three entries.
    pub hazards: Vec<HazardOutput>,
    /// Ids evicted during this tick, sorted.
    pub removed: Vec<String>,
    /// `true` when placements were recomputed this tick.
    pub spatial_refreshed: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// HazardEngine
// ────────────────────────────────────────────────────────────────────────────

/// Exclusively owned pipeline state.
pub struct HazardEngine {
    config: EngineConfig,
    depth: Box<dyn DepthResolver>,
    velocity: VelocityTracker,
    lifecycle: LifecycleTracker,
    cadence: CadenceGate,
    projector: SpatialProjector,
    /// Last published hazards, highest severity first.
    current: Vec<FusedHazard>,
    /// Placement shown for each id until the cadence gate opens again.
    placements: HashMap<String, Placement>,
}

impl HazardEngine {
    /// Validate `config` and build an engine with empty state.
    ///
    /// # Errors
    ///
    /// [`HazardError::Config`] when `config` fails
    /// [`EngineConfig::validate`].
    pub fn new(config: EngineConfig, depth: Box<dyn DepthResolver>) -> Result<Self, HazardError> {
        config.validate()?;
        info!(
            cone_deg = config.filter.cone_width_deg,
            max_hazards = config.scoring.max_hazards,
            "hazard engine initialised"
        );
        Ok(Self {
            velocity: VelocityTracker::new(config.approach_threshold),
            lifecycle: LifecycleTracker::new(config.lifecycle.clone()),
            cadence: CadenceGate::new(config.cadence.clone()),
            projector: SpatialProjector::new(config.projector.clone(), &config.lifecycle),
            current: Vec::new(),
            placements: HashMap::new(),
            depth,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the full pipeline on a frame with fresh detections.
    pub fn process(&mut self, frame: &FrameInput, now: f64) -> TickOutput {
        let candidates = self.filter(frame);
        let (candidates, motions) = self.track_motion(candidates, frame.captured_at);

        let ranked = rank(candidates, &self.config.scoring);
        let fused = fuse(ranked, &frame.confirmation, &motions, &self.config.fusion);

        let targets: Vec<(String, _)> = fused
            .iter()
            .map(|h| (h.id.clone(), self.projector.target(h)))
            .collect();
        let removed = self.lifecycle.update(&targets, now);
        for id in &removed {
            self.placements.remove(id);
        }

        // Hazards whose target was rejected by the tracker are not shown.
        self.current = fused
            .into_iter()
            .filter(|h| self.lifecycle.get(&h.id).is_some())
            .collect();

        let spatial_refreshed = self.cadence.should_recompute(now, frame.motion.heading_deg);
        self.project(spatial_refreshed);

        debug!(
            hazards = self.current.len(),
            removed = removed.len(),
            spatial_refreshed,
            "frame processed"
        );
        TickOutput {
            hazards: self.outputs(),
            removed,
            spatial_refreshed,
        }
    }

    /// Tick without fresh detections: evict timed-out hazards and keep
    /// showing the rest.
    pub fn idle(&mut self, now: f64, motion: &MotionSample) -> TickOutput {
        let removed = self.lifecycle.sweep_expired(now);
        if !removed.is_empty() {
            let gone: HashSet<&str> = removed.iter().map(String::as_str).collect();
            self.current.retain(|h| !gone.contains(h.id.as_str()));
            for id in &removed {
                self.placements.remove(id);
            }
        }

        let spatial_refreshed = self.cadence.should_recompute(now, motion.heading_deg);
        self.project(spatial_refreshed);

        TickOutput {
            hazards: self.outputs(),
            removed,
            spatial_refreshed,
        }
    }

    /// Drop every tracked hazard, e.g. when navigation ends.
    pub fn reset(&mut self) -> Vec<String> {
        self.current.clear();
        self.placements.clear();
        self.cadence.reset();
        self.velocity = VelocityTracker::new(self.config.approach_threshold);
        self.lifecycle.clear()
    }

    /// Number of hazards currently tracked.
    pub fn active_count(&self) -> usize {
        self.lifecycle.len()
    }

    // ── pipeline stages ─────────────────────────────────────────────────────

    fn filter(&self, frame: &FrameInput) -> Vec<Candidate> {
        let cfg = &self.config.filter;
        let candidates = normalize_detections(&frame.detections);
        let candidates = relevance_filter(candidates, cfg);
        let candidates = resolve_distances(candidates, self.depth.as_ref());
        let candidates = suppress_contextual(candidates, frame.motion.speed_mps, cfg);
        let candidates = cluster_crowds(candidates, cfg);
        forward_cone(candidates, cfg)
    }

    /// Observe each label once (first occurrence) and drop labels whose
    /// motion could not be computed.
    fn track_motion(
        &mut self,
        candidates: Vec<Candidate>,
        captured_at: f64,
    ) -> (Vec<Candidate>, HashMap<String, Motion>) {
        self.velocity
            .forget_stale(captured_at, self.config.velocity_max_age_s);

        let mut motions = HashMap::new();
        let mut observed: HashSet<&str> = HashSet::new();
        let mut discarded: HashSet<String> = HashSet::new();

        for c in &candidates {
            if !observed.insert(c.label.as_str()) {
                continue;
            }
            match self.velocity.observe(&c.label, &c.bbox, captured_at) {
                VelocityReading::Measured(m) => {
                    motions.insert(c.label.clone(), m);
                }
                VelocityReading::NonFinite => {
                    warn!(label = %c.label, "discarding candidate with non-finite velocity");
                    discarded.insert(c.label.clone());
                }
                VelocityReading::First | VelocityReading::Skipped => {}
            }
        }

        let kept = if discarded.is_empty() {
            candidates
        } else {
            candidates
                .into_iter()
                .filter(|c| !discarded.contains(&c.label))
                .collect()
        };
        (kept, motions)
    }

    /// Refresh placements of all current hazards when `refresh` is set;
    /// otherwise only hazards without a placement yet get one.
    fn project(&mut self, refresh: bool) {
        for hazard in &self.current {
            if !refresh && self.placements.contains_key(&hazard.id) {
                continue;
            }
            if let Some(active) = self.lifecycle.get(&hazard.id) {
                self.placements
                    .insert(hazard.id.clone(), self.projector.place(active));
            }
        }
    }

    fn outputs(&self) -> Vec<HazardOutput> {
        self.current
            .iter()
            .filter_map(|h| {
                let placement = *self.placements.get(&h.id)?;
                Some(HazardOutput {
                    id: h.id.clone(),
                    label: h.label.clone(),
                    severity: h.severity,
                    explanation: h.explanation.clone(),
                    bbox: h.bbox,
                    distance: h.distance,
                    placement,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayguard_perception::TieredDepthResolver;
    use wayguard_types::NormalizedRect;

    fn engine() -> HazardEngine {
        HazardEngine::new(EngineConfig::default(), Box::new(TieredDepthResolver::new()))
            .expect("default config is valid")
    }

    struct FixedDepth(f32);

    impl DepthResolver for FixedDepth {
        fn distance(&self, _bbox: &NormalizedRect, _label: &str) -> Option<f32> {
            Some(self.0)
        }
    }

    /// `[x, y, w, h]` for a box of side `side` centred on (`mid_x`, `mid_y`).
    fn boxed(mid_x: f32, mid_y: f32, side: f32) -> [f32; 4] {
        let r = NormalizedRect::centered(mid_x, mid_y, side, side);
        [r.x, r.y, r.width, r.height]
    }

    fn det(label: &str, mid_x: f32, mid_y: f32, distance: f32) -> RawDetection {
        RawDetection::new(label, boxed(mid_x, mid_y, 0.2), 0.9).with_distance(distance)
    }

    fn frame(t: f64, detections: Vec<RawDetection>) -> FrameInput {
        FrameInput {
            captured_at: t,
            detections,
            confirmation: BackendConfirmation::empty(),
            motion: MotionSample {
                speed_mps: Some(1.2),
                heading_deg: 0.0,
            },
        }
    }

    #[test]
    fn centred_car_at_five_metres() {
        let mut e = engine();
        let out = e.process(&frame(0.0, vec![det("car", 0.5, 0.5, 5.0)]), 0.0);
        assert_eq!(out.hazards.len(), 1);
        let car = &out.hazards[0];
        assert_eq!(car.id, "car");
        assert!((car.severity - 94.0).abs() < 1e-3);
        assert_eq!(car.explanation, "Vehicle ahead");
        assert!(out.spatial_refreshed);
        assert_eq!(car.placement.forward, 2.0);
        assert_eq!(car.placement.vertical, -0.5);
    }

    #[test]
    fn output_is_capped_and_sorted() {
        let mut e = engine();
        let out = e.process(
            &frame(
                0.0,
                vec![
                    det("dog", 0.5, 0.5, 3.0),
                    det("car", 0.45, 0.5, 10.0),
                    det("bicycle", 0.55, 0.5, 2.0),
                    det("truck", 0.5, 0.4, 6.0),
                    det("cat", 0.5, 0.6, 1.5),
                ],
            ),
            0.0,
        );
        assert_eq!(out.hazards.len(), 3);
        for pair in out.hazards.windows(2) {
            assert!(pair[0].severity >= pair[1].severity);
        }
        assert_eq!(out.hazards[0].label, "truck");
    }

    #[test]
    fn five_persons_show_as_one_crowd() {
        let mut e = engine();
        let persons = (0..5)
            .map(|i| det("person", 0.4 + i as f32 * 0.05, 0.5, 4.0))
            .collect();
        let out = e.process(&frame(0.0, persons), 0.0);
        let crowds = out.hazards.iter().filter(|h| h.label == "crowd").count();
        assert_eq!(crowds, 1);
        assert!(out.hazards.iter().all(|h| h.label != "person"));
    }

    #[test]
    fn identical_frames_never_evict() {
        let mut e = engine();
        for i in 0..30 {
            let t = i as f64 * 0.1;
            let out = e.process(&frame(t, vec![det("bus", 0.6, 0.5, 8.0)]), t);
            assert!(out.removed.is_empty());
            assert_eq!(out.hazards.len(), 1);
        }
    }

    #[test]
    fn silent_hazard_is_removed_after_timeout() {
        let mut e = engine();
        e.process(&frame(0.0, vec![det("car", 0.5, 0.5, 5.0)]), 0.0);
        let still = e.idle(1.0, &MotionSample::default());
        assert!(still.removed.is_empty());
        assert_eq!(still.hazards.len(), 1);

        let gone = e.idle(1.3, &MotionSample::default());
        assert_eq!(gone.removed, vec!["car".to_string()]);
        assert!(gone.hazards.is_empty());
        assert_eq!(e.active_count(), 0);
    }

    #[test]
    fn hazard_missing_from_fresh_frame_is_removed() {
        let mut e = engine();
        e.process(
            &frame(0.0, vec![det("car", 0.5, 0.5, 5.0), det("dog", 0.5, 0.6, 3.0)]),
            0.0,
        );
        let out = e.process(&frame(0.3, vec![det("car", 0.5, 0.5, 5.0)]), 0.3);
        assert_eq!(out.removed, vec!["dog".to_string()]);
        assert_eq!(out.hazards.len(), 1);
    }

    #[test]
    fn approaching_hazard_gains_forty() {
        let mut e = engine();
        let first = e.process(&frame(0.0, vec![det("car", 0.5, 0.6, 5.0)]), 0.0);
        let base = first.hazards[0].severity;
        // Midpoint sinks by 0.1 over 0.5 s: approach speed 0.2 > 0.015.
        let second = e.process(&frame(0.5, vec![det("car", 0.5, 0.5, 5.0)]), 0.5);
        let car = &second.hazards[0];
        assert!((car.severity - base - 40.0).abs() < 1e-3);
        assert!(car.explanation.ends_with("approaching fast"));
    }

    #[test]
    fn backend_confirmation_boosts_matching_hazard() {
        let mut e = engine();
        let mut f = frame(0.0, vec![det("car", 0.5, 0.5, 5.0)]);
        f.confirmation = BackendConfirmation::from_labels(["car", "horse"]);
        let out = e.process(&f, 0.0);
        assert_eq!(out.hazards.len(), 1);
        assert!((out.hazards[0].severity - 102.0).abs() < 1e-3);
        assert!(out.hazards[0].explanation.contains("confirmed by backend"));
    }

    #[test]
    fn placement_is_cached_between_cadence_ticks() {
        let mut e = engine();
        let first = e.process(&frame(0.0, vec![det("car", 0.5, 0.5, 5.0)]), 0.0);
        let lateral0 = first.hazards[0].placement.lateral;

        // Box moved right, but the gate is still closed 0.1 s later.
        let held = e.process(&frame(0.1, vec![det("car", 0.6, 0.5, 5.0)]), 0.1);
        assert!(!held.spatial_refreshed);
        assert_eq!(held.hazards[0].placement.lateral, lateral0);

        let moved = e.process(&frame(0.25, vec![det("car", 0.6, 0.5, 5.0)]), 0.25);
        assert!(moved.spatial_refreshed);
        assert!(moved.hazards[0].placement.lateral > lateral0);
    }

    #[test]
    fn turning_refreshes_placement_early() {
        let mut e = engine();
        e.process(&frame(0.0, vec![det("car", 0.5, 0.5, 5.0)]), 0.0);
        let mut turned = frame(0.05, vec![det("car", 0.6, 0.5, 5.0)]);
        turned.motion.heading_deg = 10.0;
        assert!(e.process(&turned, 0.05).spatial_refreshed);
    }

    #[test]
    fn off_axis_hazard_is_ignored() {
        let mut e = engine();
        let out = e.process(&frame(0.0, vec![det("car", 0.9, 0.5, 5.0)]), 0.0);
        assert!(out.hazards.is_empty());
    }

    #[test]
    fn stationary_user_ignores_adjacent_person() {
        let mut e = engine();
        let mut f = frame(0.0, vec![det("person", 0.5, 0.5, 0.5)]);
        f.motion.speed_mps = Some(0.0);
        assert!(e.process(&f, 0.0).hazards.is_empty());

        f.motion.speed_mps = None;
        assert_eq!(e.process(&f, 0.1).hazards.len(), 1);
    }

    #[test]
    fn duplicate_labels_get_distinct_ids() {
        let mut e = engine();
        let out = e.process(
            &frame(0.0, vec![det("car", 0.45, 0.5, 5.0), det("car", 0.55, 0.5, 10.0)]),
            0.0,
        );
        let ids: Vec<&str> = out.hazards.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["car", "car-2"]);
    }

    #[test]
    fn reset_returns_every_active_id() {
        let mut e = engine();
        e.process(
            &frame(0.0, vec![det("car", 0.5, 0.5, 5.0), det("dog", 0.5, 0.6, 3.0)]),
            0.0,
        );
        assert_eq!(e.reset(), vec!["car".to_string(), "dog".to_string()]);
        assert!(e.idle(0.1, &MotionSample::default()).hazards.is_empty());
    }

    #[test]
    fn label_returning_after_long_absence_is_a_first_sighting() {
        let mut e = engine();
        e.process(&frame(0.0, vec![det("car", 0.5, 0.6, 5.0)]), 0.0);
        // 3 s later and lower in the frame; the 2 s old sample is forgotten.
        let out = e.process(&frame(3.0, vec![det("car", 0.5, 0.5, 5.0)]), 3.0);
        assert!((out.hazards[0].severity - 94.0).abs() < 1e-3);
        assert!(!out.hazards[0].explanation.contains("approaching"));
    }

    #[test]
    fn non_finite_depth_never_reaches_output() {
        for bad in [f32::NAN, f32::INFINITY] {
            let mut e =
                HazardEngine::new(EngineConfig::default(), Box::new(FixedDepth(bad))).unwrap();
            let car = RawDetection::new("car", boxed(0.5, 0.5, 0.2), 0.9);
            let out = e.process(&frame(0.0, vec![car]), 0.0);
            assert!(out.hazards.is_empty(), "distance {bad} leaked into output");
            assert_eq!(e.active_count(), 0);
        }
    }

    #[test]
    fn oversized_top_k_is_rejected_at_construction() {
        let mut cfg = EngineConfig::default();
        cfg.scoring.max_hazards = 6;
        let result = HazardEngine::new(cfg, Box::new(TieredDepthResolver::new()));
        assert!(matches!(result, Err(HazardError::Config(_))));
    }

    #[test]
    fn nan_side_limit_is_rejected_at_construction() {
        let mut cfg = EngineConfig::default();
        cfg.lifecycle.side_limit_m = f32::NAN;
        assert!(HazardEngine::new(cfg, Box::new(TieredDepthResolver::new())).is_err());
    }
}
