//! Severity scoring and ranking.
//!
//! ```text
//! severity = base(class) + boost(distance)
//! boost    = clamp01((25 − d) / 25) × 30     when d is known
//!          = 10                              when d is unknown
//! ```
//!
//! Candidates are stable-sorted by severity (ties keep detection order) and
//! truncated to the top `max_hazards`.
//!
//! # Example
//!
//! ```rust
//! use wayguard_perception::severity::{score_candidate, ScoringConfig};
//! use wayguard_types::{Candidate, NormalizedRect};
//!
//! let car = Candidate::new("car", NormalizedRect::centered(0.5, 0.5, 0.2, 0.2))
//!     .with_distance(5.0);
//! let scored = score_candidate(&car, &ScoringConfig::default());
//! assert!((scored.severity - 94.0).abs() < 1e-3);
//! assert_eq!(scored.explanation, "Vehicle ahead");
//! ```

use serde::{Deserialize, Serialize};
use wayguard_types::Candidate;

use crate::class::HazardClass;

/// Ranking parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Distance (metres) at which the proximity boost reaches zero.
    pub boost_range_m: f32,
    /// Proximity boost at zero distance.
    pub max_distance_boost: f32,
    /// Flat boost applied when the distance is unknown.
    pub unknown_distance_boost: f32,
    /// Size of the ranked output.
    pub max_hazards: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            boost_range_m: 25.0,
            max_distance_boost: 30.0,
            unknown_distance_boost: 10.0,
            max_hazards: 3,
        }
    }
}

/// Severity and explanation of one candidate, before fusion.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredHazard {
    pub label: String,
    pub severity: f32,
    pub explanation: String,
}

/// A candidate that survived ranking, paired with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    pub scored: ScoredHazard,
}

/// Proximity boost for an optional distance.
pub fn distance_boost(distance: Option<f32>, config: &ScoringConfig) -> f32 {
    match distance {
        Some(d) if config.boost_range_m > 0.0 => {
            ((config.boost_range_m - d) / config.boost_range_m).clamp(0.0, 1.0)
                * config.max_distance_boost
        }
        Some(_) => 0.0,
        None => config.unknown_distance_boost,
    }
}

/// Score a single candidate.
pub fn score_candidate(candidate: &Candidate, config: &ScoringConfig) -> ScoredHazard {
    let class = HazardClass::from_label(&candidate.label);
    let severity = (class.base_score() + distance_boost(candidate.distance, config)).max(0.0);
    ScoredHazard {
        label: candidate.label.clone(),
        severity,
        explanation: class.explanation(&candidate.label),
    }
}

/// Score, stable-sort descending and keep the top `max_hazards`.
pub fn rank(candidates: Vec<Candidate>, config: &ScoringConfig) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = candidates
        .into_iter()
        .map(|candidate| {
            let scored = score_candidate(&candidate, config);
            RankedCandidate { candidate, scored }
        })
        .collect();
    // `sort_by` is stable, so equal severities keep detection order.
    ranked.sort_by(|a, b| b.scored.severity.total_cmp(&a.scored.severity));
    ranked.truncate(config.max_hazards);
    ranked
}
