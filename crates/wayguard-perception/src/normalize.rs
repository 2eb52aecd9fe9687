//! Detection Normalizer.
//!
//! Converts raw detector output into [`Candidate`]s.  Labels are trimmed and
//! lowercased, boxes are clipped to the unit square, and anything carrying a
//! NaN/∞ value is discarded before it can reach a stateful stage.

use serde::{Deserialize, Serialize};
use tracing::debug;
use wayguard_types::{Candidate, NormalizedRect};

/// One object as reported by the on-device detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub label: String,
    /// `[x, y, width, height]`, normalised, bottom-left origin.
    pub bbox: [f32; 4],
    #[serde(default)]
    pub confidence: Option<f32>,
    /// Distance already measured by the source, if any.
    #[serde(default)]
    pub distance: Option<f32>,
}

impl RawDetection {
    pub fn new(label: impl Into<String>, bbox: [f32; 4], confidence: f32) -> Self {
        Self {
            label: label.into(),
            bbox,
            confidence: Some(confidence),
            distance: None,
        }
    }

    pub fn with_distance(mut self, distance: f32) -> Self {
        self.distance = Some(distance);
        self
    }
}

/// Normalise a whole detector batch, preserving detection order.
pub fn normalize_detections(raw: &[RawDetection]) -> Vec<Candidate> {
    raw.iter().filter_map(normalize_detection).collect()
}

/// Normalise a single detection.  Returns `None` when it cannot be used.
pub fn normalize_detection(raw: &RawDetection) -> Option<Candidate> {
    let label = raw.label.trim().to_lowercase();
    if label.is_empty() {
        return None;
    }

    let [x, y, w, h] = raw.bbox;
    let mut candidate = Candidate {
        label,
        bbox: NormalizedRect::new(x, y, w, h),
        confidence: raw.confidence,
        // A non-positive measured distance carries no information; NaN is
        // kept so that validation rejects it.
        distance: raw.distance.filter(|d| d.is_nan() || *d > 0.0),
    };
    if let Err(e) = candidate.validate() {
        debug!(error = %e, "dropping detection");
        return None;
    }
    candidate.bbox = clip_to_unit(candidate.bbox);
    Some(candidate)
}

/// Clip `rect` to the unit square, shrinking width/height as needed.
fn clip_to_unit(rect: NormalizedRect) -> NormalizedRect {
    let x0 = rect.x.clamp(0.0, 1.0);
    let y0 = rect.y.clamp(0.0, 1.0);
    let x1 = (rect.x + rect.width).clamp(0.0, 1.0);
    let y1 = (rect.y + rect.height).clamp(0.0, 1.0);
    NormalizedRect::new(x0, y0, (x1 - x0).max(0.0), (y1 - y0).max(0.0))
}
