//! `wayguard-types` – shared vocabulary for the hazard pipeline.
//!
//! Every crate in the workspace speaks in terms of these types: detector
//! output is normalised into [`Candidate`]s, the ranking and fusion stages
//! emit [`FusedHazard`]s, and the runtime hands [`HazardOutput`]s (wrapped in
//! [`HazardEvent`]s) to whatever renders them.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────────────────

/// Axis-aligned bounding box in normalised `[0, 1]` image coordinates.
///
/// The origin is the bottom-left corner of the frame and `y` grows upwards,
/// so an object whose midpoint moves down the frame (decreasing `y`) is
/// getting closer to the camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NormalizedRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A box of the given size whose midpoint sits at `(mid_x, mid_y)`.
    pub fn centered(mid_x: f32, mid_y: f32, width: f32, height: f32) -> Self {
        Self::new(mid_x - width / 2.0, mid_y - height / 2.0, width, height)
    }

    pub fn mid_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn mid_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// `true` when every component is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Element-wise mean of `rects` (x, y, width and height averaged
    /// independently).  Returns `None` for an empty slice.
    pub fn mean_of(rects: &[NormalizedRect]) -> Option<NormalizedRect> {
        if rects.is_empty() {
            return None;
        }
        let n = rects.len() as f32;
        let (x, y, w, h) = rects.iter().fold((0.0, 0.0, 0.0, 0.0), |acc, r| {
            (acc.0 + r.x, acc.1 + r.y, acc.2 + r.width, acc.3 + r.height)
        });
        Some(NormalizedRect::new(x / n, y / n, w / n, h / n))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline records
// ────────────────────────────────────────────────────────────────────────────

/// A single object the pipeline is still considering this frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Lowercase class label, e.g. `"car"` or `"person"`.
    pub label: String,
    pub bbox: NormalizedRect,
    /// Detector confidence in `[0, 1]`, when the source reports one.
    #[serde(default)]
    pub confidence: Option<f32>,
    /// Estimated distance in metres.  `None` means unknown, never zero.
    #[serde(default)]
    pub distance: Option<f32>,
}

impl Candidate {
    pub fn new(label: impl Into<String>, bbox: NormalizedRect) -> Self {
        Self {
            label: label.into(),
            bbox,
            confidence: None,
            distance: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_distance(mut self, distance: f32) -> Self {
        self.distance = Some(distance);
        self
    }

    /// `true` when the box, confidence and distance hold no NaN/∞ values.
    pub fn is_finite(&self) -> bool {
        self.validate().is_ok()
    }

    /// Reject candidates carrying NaN/∞ in the box, confidence or distance.
    ///
    /// # Errors
    ///
    /// [`HazardError::InvalidGeometry`] naming the offending field.
    pub fn validate(&self) -> Result<(), HazardError> {
        let details = if !self.bbox.is_finite() {
            format!("non-finite bbox {:?}", self.bbox)
        } else if let Some(c) = self.confidence.filter(|c| !c.is_finite()) {
            format!("non-finite confidence {c}")
        } else if let Some(d) = self.distance.filter(|d| !d.is_finite()) {
            format!("non-finite distance {d}")
        } else {
            return Ok(());
        };
        Err(HazardError::InvalidGeometry {
            label: self.label.clone(),
            details,
        })
    }
}

/// Labels confirmed by the remote semantic pass.  They carry no geometry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfirmation {
    labels: BTreeSet<String>,
}

impl BackendConfirmation {
    /// An empty confirmation set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a set from arbitrary label strings.  Labels are trimmed and
    /// lowercased; blank entries are ignored.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let labels = labels
            .into_iter()
            .map(|l| l.as_ref().trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .collect();
        Self { labels }
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

/// A ranked hazard after cross-source fusion, ready for lifecycle tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedHazard {
    /// Stable identifier derived from the label (see
    /// [`hazard_id`]).
    pub id: String,
    pub label: String,
    pub severity: f32,
    pub explanation: String,
    pub bbox: NormalizedRect,
    pub distance: Option<f32>,
}

/// Derive the hazard id for the `ordinal`-th hazard (zero based) carrying
/// `label` within one ranked frame.
///
/// The first occurrence uses the bare label so ids stay stable as long as the
/// class stays in view; later occurrences get a numeric suffix.
pub fn hazard_id(label: &str, ordinal: usize) -> String {
    let base = label.trim().replace(' ', "-");
    if ordinal == 0 {
        base
    } else {
        format!("{base}-{}", ordinal + 1)
    }
}

/// Camera-relative placement offset handed to the renderer verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Metres in front of the camera.
    pub forward: f32,
    /// Metres to the right (positive) or left (negative) of the camera.
    pub lateral: f32,
    /// Metres above (positive) or below (negative) eye level.
    pub vertical: f32,
}

/// One entry of the per-tick output list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardOutput {
    pub id: String,
    pub label: String,
    pub severity: f32,
    pub explanation: String,
    pub bbox: NormalizedRect,
    pub distance: Option<f32>,
    pub placement: Placement,
}

/// User motion reported by the motion/heading collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionSample {
    /// Walking speed in m/s, when known.
    #[serde(default)]
    pub speed_mps: Option<f32>,
    /// Heading in degrees clockwise from north.
    #[serde(default)]
    pub heading_deg: f32,
}

// ────────────────────────────────────────────────────────────────────────────
// Events delivered to renderers
// ────────────────────────────────────────────────────────────────────────────

/// Envelope for everything the runtime publishes on the hazard bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazardEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"wayguard-runtime::hazard_loop"`
    pub source: String,
    pub payload: HazardEventPayload,
}

impl HazardEvent {
    pub fn new(source: impl Into<String>, payload: HazardEventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HazardEventPayload {
    /// The full, ordered hazard list for one tick (at most three entries).
    Placements(Vec<HazardOutput>),
    /// Ids that were active on the previous tick and have been evicted.
    Removed(Vec<String>),
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error type shared across the workspace.
///
/// None of these are fatal to the host: the engine degrades to showing
/// nothing, and callers log and continue.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum HazardError {
    #[error("Backend payload rejected: {0}")]
    BackendPayload(String),

    #[error("Invalid geometry for {label}: {details}")]
    InvalidGeometry { label: String, details: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Channel error: {0}")]
    Channel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_midpoint_and_area() {
        let r = NormalizedRect::new(0.2, 0.4, 0.2, 0.4);
        assert!((r.mid_x() - 0.3).abs() < 1e-6);
        assert!((r.mid_y() - 0.6).abs() < 1e-6);
        assert!((r.area() - 0.08).abs() < 1e-6);
    }

    #[test]
    fn centered_rect_has_requested_midpoint() {
        let r = NormalizedRect::centered(0.5, 0.5, 0.2, 0.3);
        assert!((r.mid_x() - 0.5).abs() < 1e-6);
        assert!((r.mid_y() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn mean_of_averages_each_component() {
        let rects = [
            NormalizedRect::new(0.0, 0.2, 0.1, 0.3),
            NormalizedRect::new(0.4, 0.4, 0.3, 0.1),
        ];
        let mean = NormalizedRect::mean_of(&rects).unwrap();
        assert!((mean.x - 0.2).abs() < 1e-6);
        assert!((mean.y - 0.3).abs() < 1e-6);
        assert!((mean.width - 0.2).abs() < 1e-6);
        assert!((mean.height - 0.2).abs() < 1e-6);
        assert!(NormalizedRect::mean_of(&[]).is_none());
    }

    #[test]
    fn candidate_with_nan_is_not_finite() {
        let ok = Candidate::new("car", NormalizedRect::new(0.1, 0.1, 0.2, 0.2)).with_distance(4.0);
        assert!(ok.is_finite());

        let bad_box = Candidate::new("car", NormalizedRect::new(f32::NAN, 0.1, 0.2, 0.2));
        assert!(!bad_box.is_finite());

        let bad_distance = ok.clone().with_distance(f32::INFINITY);
        assert!(!bad_distance.is_finite());
    }

    #[test]
    fn validate_names_the_bad_field() {
        let car = Candidate::new("car", NormalizedRect::new(0.1, 0.1, 0.2, 0.2));
        assert!(car.validate().is_ok());

        match car.clone().with_distance(f32::NAN).validate() {
            Err(HazardError::InvalidGeometry { label, details }) => {
                assert_eq!(label, "car");
                assert!(details.contains("distance"));
            }
            other => panic!("unexpected {other:?}"),
        }
        let err = car.with_confidence(f32::INFINITY).validate().unwrap_err();
        assert!(err.to_string().contains("confidence"));
    }

    #[test]
    fn confirmation_normalises_labels() {
        let set = BackendConfirmation::from_labels(["  Car ", "PERSON", ""]);
        assert_eq!(set.len(), 2);
        assert!(set.contains("car"));
        assert!(set.contains("person"));
    }

    #[test]
    fn hazard_id_suffixes_repeated_labels() {
        assert_eq!(hazard_id("car", 0), "car");
        assert_eq!(hazard_id("car", 1), "car-2");
        assert_eq!(hazard_id("stop sign", 0), "stop-sign");
    }

    #[test]
    fn hazard_event_roundtrip() {
        let event = HazardEvent::new(
            "wayguard-runtime::hazard_loop",
            HazardEventPayload::Removed(vec!["car".to_string()]),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: HazardEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        match back.payload {
            HazardEventPayload::Removed(ids) => assert_eq!(ids, vec!["car".to_string()]),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn hazard_error_display() {
        assert!(HazardError::Config("bad".into()).to_string().contains("Invalid configuration"));
        assert!(HazardError::Channel("closed".into()).to_string().contains("closed"));
    }
}
