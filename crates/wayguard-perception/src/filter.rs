//! Candidate filtering chain.
//!
//! Four pure stages run in sequence on every frame:
//!
//! 1. [`relevance_filter`] – allow-listed classes with a usable box size.
//! 2. [`suppress_contextual`] – drops a person standing right next to a
//!    stationary user.
//! 3. [`cluster_crowds`] – collapses many persons into one `crowd`.
//! 4. [`forward_cone`] – keeps what is roughly ahead of the user.
//!
//! None of the stages keep state; the same input always gives the same
//! output.

use serde::{Deserialize, Serialize};
use tracing::debug;
use wayguard_types::{Candidate, NormalizedRect};

use crate::class::{CROWD_LABEL, PERSON_LABEL};

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Thresholds for the filtering chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Classes that may become hazards.  `crowd` is never listed here: it is
    /// only ever synthesised by [`cluster_crowds`].
    pub allowed_labels: Vec<String>,
    /// Minimum normalised box area.
    pub min_area: f32,
    /// Minimum normalised box width and height.
    pub min_side: f32,
    /// Below this speed (m/s) the user counts as stationary.
    pub stationary_speed_mps: f32,
    /// A person closer than this (metres) to a stationary user is ignored.
    pub near_person_m: f32,
    /// Number of persons that turns into a crowd.
    pub crowd_threshold: usize,
    /// Full width of the forward cone in degrees.
    pub cone_width_deg: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            allowed_labels: [
                "person",
                "car",
                "truck",
                "bus",
                "motorcycle",
                "motorbike",
                "bicycle",
                "bike",
                "cyclist",
                "dog",
                "cat",
                "horse",
                "animal",
                "traffic light",
                "stop sign",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            min_area: 0.010,
            min_side: 0.05,
            stationary_speed_mps: 0.3,
            near_person_m: 0.7,
            crowd_threshold: 5,
            cone_width_deg: 60.0,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stages
// ────────────────────────────────────────────────────────────────────────────

/// Keep allow-listed classes whose box is large enough to be trusted.
///
/// Tiny boxes are almost always reflections or model noise on distant
/// artifacts.
pub fn relevance_filter(candidates: Vec<Candidate>, config: &FilterConfig) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|c| {
            let relevant = config.allowed_labels.iter().any(|l| *l == c.label);
            let sized = c.bbox.area() >= config.min_area
                && c.bbox.width >= config.min_side
                && c.bbox.height >= config.min_side;
            if relevant && !sized {
                debug!(label = %c.label, area = c.bbox.area(), "dropping degenerate box");
            }
            relevant && sized
        })
        .collect()
}

/// Drop a person closer than `near_person_m` while the user is stationary.
///
/// Only the `person` class is suppressed.  An unknown speed or an unknown
/// distance never suppresses anything.
pub fn suppress_contextual(
    candidates: Vec<Candidate>,
    speed_mps: Option<f32>,
    config: &FilterConfig,
) -> Vec<Candidate> {
    let stationary = speed_mps.is_some_and(|s| s < config.stationary_speed_mps);
    if !stationary {
        return candidates;
    }
    candidates
        .into_iter()
        .filter(|c| {
            let near_person = c.label == PERSON_LABEL
                && c.distance.is_some_and(|d| d < config.near_person_m);
            !near_person
        })
        .collect()
}

/// Replace `crowd_threshold` or more persons with one `crowd` candidate.
///
/// The crowd box is the element-wise mean of the person boxes, its
/// confidence the mean of the known member confidences, and its distance the
/// closest known member distance.  Non-person candidates keep their order and
/// the crowd is appended after them.
pub fn cluster_crowds(candidates: Vec<Candidate>, config: &FilterConfig) -> Vec<Candidate> {
    let person_count = candidates.iter().filter(|c| c.label == PERSON_LABEL).count();
    if person_count < config.crowd_threshold.max(1) {
        return candidates;
    }

    let (persons, mut rest): (Vec<Candidate>, Vec<Candidate>) = candidates
        .into_iter()
        .partition(|c| c.label == PERSON_LABEL);

    let boxes: Vec<NormalizedRect> = persons.iter().map(|p| p.bbox).collect();
    let Some(bbox) = NormalizedRect::mean_of(&boxes) else {
        return rest;
    };

    let confidences: Vec<f32> = persons.iter().filter_map(|p| p.confidence).collect();
    let confidence = if confidences.is_empty() {
        None
    } else {
        Some(confidences.iter().sum::<f32>() / confidences.len() as f32)
    };
    let distance = persons
        .iter()
        .filter_map(|p| p.distance)
        .min_by(|a, b| a.total_cmp(b));

    debug!(members = persons.len(), "collapsed persons into a crowd");
    rest.push(Candidate {
        label: CROWD_LABEL.to_string(),
        bbox,
        confidence,
        distance,
    });
    rest
}

/// Angular deviation (degrees) of the box centre from the screen centre.
///
/// A fast proxy for bearing: `|mid_x − 0.5| × 180°`, not a projection
/// through camera intrinsics.
pub fn angular_deviation_deg(bbox: &NormalizedRect) -> f32 {
    (bbox.mid_x() - 0.5).abs() * 180.0
}

/// `true` when `bbox` lies strictly inside a cone of `cone_width_deg`.
pub fn in_forward_cone(bbox: &NormalizedRect, cone_width_deg: f32) -> bool {
    angular_deviation_deg(bbox) < cone_width_deg / 2.0
}

/// Keep only candidates inside the configured forward cone.
pub fn forward_cone(candidates: Vec<Candidate>, config: &FilterConfig) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|c| in_forward_cone(&c.bbox, config.cone_width_deg))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(label: &str, mid_x: f32, mid_y: f32) -> Candidate {
        Candidate::new(label, NormalizedRect::centered(mid_x, mid_y, 0.2, 0.2))
    }

    // ── relevance ───────────────────────────────────────────────────────────

    #[test]
    fn irrelevant_classes_are_dropped() {
        let cfg = FilterConfig::default();
        let out = relevance_filter(vec![at("car", 0.5, 0.5), at("chair", 0.5, 0.5)], &cfg);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label, "car");
    }

    #[test]
    fn detector_crowd_label_is_not_relevant() {
        let cfg = FilterConfig::default();
        assert!(relevance_filter(vec![at("crowd", 0.5, 0.5)], &cfg).is_empty());
    }

    #[test]
    fn tiny_and_thin_boxes_are_dropped() {
        let cfg = FilterConfig::default();
        // Area 0.09 × 0.1 = 0.009 < 0.010
        let tiny = Candidate::new("car", NormalizedRect::new(0.4, 0.4, 0.09, 0.1));
        // Area is large but width < 0.05
        let thin = Candidate::new("car", NormalizedRect::new(0.4, 0.0, 0.04, 0.9));
        let fine = Candidate::new("car", NormalizedRect::new(0.4, 0.4, 0.12, 0.12));
        let out = relevance_filter(vec![tiny, thin, fine.clone()], &cfg);
        assert_eq!(out, vec![fine]);
    }

    // ── contextual suppression ──────────────────────────────────────────────

    #[test]
    fn near_person_dropped_when_stationary() {
        let cfg = FilterConfig::default();
        let near = at("person", 0.5, 0.5).with_distance(0.5);
        let far = at("person", 0.5, 0.5).with_distance(3.0);
        let out = suppress_contextual(vec![near, far.clone()], Some(0.1), &cfg);
        assert_eq!(out, vec![far]);
    }

    #[test]
    fn near_person_kept_while_walking() {
        let cfg = FilterConfig::default();
        let near = at("person", 0.5, 0.5).with_distance(0.5);
        assert_eq!(suppress_contextual(vec![near.clone()], Some(1.2), &cfg).len(), 1);
        assert_eq!(suppress_contextual(vec![near], None, &cfg).len(), 1);
    }

    #[test]
    fn suppression_only_applies_to_persons() {
        let cfg = FilterConfig::default();
        let bike = at("bicycle", 0.5, 0.5).with_distance(0.4);
        let unknown = at("person", 0.5, 0.5);
        let out = suppress_contextual(vec![bike, unknown], Some(0.0), &cfg);
        assert_eq!(out.len(), 2);
    }

    // ── crowd clustering ────────────────────────────────────────────────────

    #[test]
    fn four_persons_stay_individual() {
        let cfg = FilterConfig::default();
        let input: Vec<_> = (0..4).map(|i| at("person", 0.3 + 0.1 * i as f32, 0.5)).collect();
        let out = cluster_crowds(input, &cfg);
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|c| c.label == "person"));
    }

    #[test]
    fn five_persons_become_one_crowd() {
        let cfg = FilterConfig::default();
        let mut input: Vec<_> = (0..5)
            .map(|i| at("person", 0.3 + 0.1 * i as f32, 0.5).with_distance(2.0 + i as f32))
            .collect();
        input.insert(2, at("car", 0.5, 0.5));

        let out = cluster_crowds(input, &cfg);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].label, "car");
        let crowd = &out[1];
        assert_eq!(crowd.label, "crowd");
        assert!((crowd.bbox.mid_x() - 0.5).abs() < 1e-5);
        assert_eq!(crowd.distance, Some(2.0));
    }

    #[test]
    fn crowd_box_is_order_independent() {
        let cfg = FilterConfig::default();
        let forward: Vec<_> = (0..6).map(|i| at("person", 0.2 + 0.1 * i as f32, 0.4)).collect();
        let mut backward = forward.clone();
        backward.reverse();
        let a = cluster_crowds(forward, &cfg);
        let b = cluster_crowds(backward, &cfg);
        assert!((a[0].bbox.x - b[0].bbox.x).abs() < 1e-6);
        assert!((a[0].bbox.width - b[0].bbox.width).abs() < 1e-6);
    }

    #[test]
    fn crowd_confidence_is_mean_of_members() {
        let cfg = FilterConfig::default();
        let input: Vec<_> = [0.2, 0.4, 0.6, 0.8, 1.0]
            .iter()
            .map(|c| at("person", 0.5, 0.5).with_confidence(*c))
            .collect();
        let out = cluster_crowds(input, &cfg);
        assert!((out[0].confidence.unwrap() - 0.6).abs() < 1e-5);
        assert_eq!(out[0].distance, None);
    }

    // ── forward cone ────────────────────────────────────────────────────────

    #[test]
    fn centred_box_passes_any_positive_cone() {
        let bbox = NormalizedRect::centered(0.5, 0.7, 0.2, 0.2);
        for cone in [0.1_f32, 1.0, 60.0, 179.0, 360.0] {
            assert!(in_forward_cone(&bbox, cone), "cone {cone}");
        }
    }

    #[test]
    fn edge_boxes_fail_narrow_cones() {
        let left = NormalizedRect::centered(0.0, 0.5, 0.2, 0.2);
        let right = NormalizedRect::centered(1.0, 0.5, 0.2, 0.2);
        for cone in [10.0_f32, 60.0, 179.9] {
            assert!(!in_forward_cone(&left, cone));
            assert!(!in_forward_cone(&right, cone));
        }
    }

    #[test]
    fn default_cone_is_thirty_degrees_each_side() {
        let cfg = FilterConfig::default();
        // 0.1 off-centre → 18°, inside; 0.2 off-centre → 36°, outside.
        let out = forward_cone(vec![at("car", 0.6, 0.5), at("bus", 0.7, 0.5)], &cfg);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label, "car");
    }
}
