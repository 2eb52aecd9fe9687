//! Cross-Source Fusion.
//!
//! Merges the label-only confirmations of the remote semantic pass and the
//! per-label motion signals into the ranked, geometry-bearing candidates.
//!
//! For every ranked candidate, in order:
//!
//! 1. **Backend** – when a confirmed label matches the candidate's class the
//!    severity gains `backend_boost` and the explanation gets
//!    `" — confirmed by backend"`.
//! 2. **Motion** – an approaching label gains `approach_boost`
//!    (`" — approaching fast"`); otherwise a label whose horizontal speed
//!    exceeds `crossing_threshold` gains `crossing_boost`
//!    (`" — moving across path"`).
//!
//! A confirmed label with no geometric counterpart cannot be placed and is
//! dropped.  The fused list is re-sorted by final severity (stable) and each
//! entry receives its [`hazard_id`].
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use wayguard_perception::fusion::{fuse, FusionConfig};
//! use wayguard_perception::severity::{rank, ScoringConfig};
//! use wayguard_types::{BackendConfirmation, Candidate, NormalizedRect};
//!
//! let ranked = rank(
//!     vec![Candidate::new("car", NormalizedRect::centered(0.5, 0.5, 0.2, 0.2)).with_distance(5.0)],
//!     &ScoringConfig::default(),
//! );
//! let backend = BackendConfirmation::from_labels(["car", "dog"]);
//! let fused = fuse(ranked, &backend, &HashMap::new(), &FusionConfig::default());
//!
//! assert_eq!(fused.len(), 1); // "dog" has no geometry
//! assert!((fused[0].severity - 102.0).abs() < 1e-3);
//! assert_eq!(fused[0].explanation, "Vehicle ahead — confirmed by backend");
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use wayguard_types::{BackendConfirmation, FusedHazard, hazard_id};

use crate::class::HazardClass;
use crate::severity::RankedCandidate;
use crate::velocity::Motion;

/// Boosts applied during fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub backend_boost: f32,
    pub approach_boost: f32,
    pub crossing_boost: f32,
    /// Horizontal speed (frame widths per second) above which a label is
    /// moving across the path.
    pub crossing_threshold: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            backend_boost: 8.0,
            approach_boost: 40.0,
            crossing_boost: 5.0,
            crossing_threshold: 0.015,
        }
    }
}

/// `true` when a backend `confirmed` label vouches for a candidate labelled
/// `label`.
///
/// Exact matches always count.  Otherwise both labels must fall in the same
/// risk class (so `"vehicle"` confirms a `"car"`), except for the catch-all
/// [`HazardClass::Other`], which only matches exactly.
pub fn confirms(confirmed: &str, label: &str) -> bool {
    if confirmed == label {
        return true;
    }
    let class = HazardClass::from_label(label);
    class != HazardClass::Other && HazardClass::from_label(confirmed) == class
}

/// Fuse ranked candidates with backend confirmations and motion signals.
///
/// `motions` is keyed by label, as produced by the velocity tracker.
pub fn fuse(
    ranked: Vec<RankedCandidate>,
    backend: &BackendConfirmation,
    motions: &HashMap<String, Motion>,
    config: &FusionConfig,
) -> Vec<FusedHazard> {
    let mut fused: Vec<FusedHazard> = ranked
        .into_iter()
        .map(|r| {
            let label = r.candidate.label;
            let mut severity = r.scored.severity;
            let mut explanation = r.scored.explanation;

            if backend.iter().any(|confirmed| confirms(confirmed, &label)) {
                severity += config.backend_boost;
                explanation.push_str(" — confirmed by backend");
            }

            if let Some(motion) = motions.get(&label) {
                if motion.is_approaching {
                    severity += config.approach_boost;
                    explanation.push_str(" — approaching fast");
                } else if motion.is_crossing(config.crossing_threshold) {
                    severity += config.crossing_boost;
                    explanation.push_str(" — moving across path");
                }
            }

            FusedHazard {
                id: String::new(),
                label,
                severity: severity.max(0.0),
                explanation,
                bbox: r.candidate.bbox,
                distance: r.candidate.distance,
            }
        })
        .collect();

    if !backend.is_empty() {
        let unmatched: Vec<&str> = backend
            .iter()
            .filter(|confirmed| !fused.iter().any(|h| confirms(confirmed, &h.label)))
            .collect();
        if !unmatched.is_empty() {
            debug!(labels = ?unmatched, "backend labels without geometry dropped");
        }
    }

    fused.sort_by(|a, b| b.severity.total_cmp(&a.severity));

    let mut seen: HashMap<String, usize> = HashMap::new();
    for hazard in &mut fused {
        let ordinal = seen.entry(hazard.label.clone()).or_insert(0);
        hazard.id = hazard_id(&hazard.label, *ordinal);
        *ordinal += 1;
    }
    fused
}
