//! Hazard classes.
//!
//! Detector labels are free-form strings; every stage that needs to reason
//! about "is this a vehicle?" goes through [`HazardClass::from_label`] so the
//! grouping lives in exactly one place.

use serde::{Deserialize, Serialize};

/// Label of the synthetic aggregate produced by crowd clustering.
pub const CROWD_LABEL: &str = "crowd";

/// Label of a single pedestrian.
pub const PERSON_LABEL: &str = "person";

/// Coarse risk class of a detection label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HazardClass {
    Vehicle,
    Cyclist,
    Animal,
    Crowd,
    Person,
    /// Relevant but not inherently dangerous (traffic-control signage).
    Other,
}

impl HazardClass {
    /// Classify a lowercase label.
    pub fn from_label(label: &str) -> Self {
        match label {
            "car" | "truck" | "bus" | "vehicle" => HazardClass::Vehicle,
            "bicycle" | "bike" | "cyclist" | "motorcycle" | "motorbike" | "motorcyclist"
            | "scooter" => HazardClass::Cyclist,
            "dog" | "cat" | "horse" | "bird" | "cow" | "sheep" | "animal" => HazardClass::Animal,
            CROWD_LABEL => HazardClass::Crowd,
            PERSON_LABEL | "pedestrian" => HazardClass::Person,
            _ => HazardClass::Other,
        }
    }

    /// Severity contribution of the class alone.
    pub fn base_score(self) -> f32 {
        match self {
            HazardClass::Vehicle => 70.0,
            HazardClass::Cyclist => 55.0,
            HazardClass::Animal => 40.0,
            HazardClass::Crowd => 38.0,
            HazardClass::Person => 30.0,
            HazardClass::Other => 0.0,
        }
    }

    /// Constant `k` of the box-size distance heuristic `k / avg_box_size`.
    pub fn size_heuristic_k(self) -> f32 {
        match self {
            HazardClass::Person => 1.2,
            HazardClass::Animal => 0.8,
            HazardClass::Vehicle => 3.0,
            _ => 2.0,
        }
    }

    /// Short user-facing explanation.  `label` is only used for
    /// [`HazardClass::Other`].
    pub fn explanation(self, label: &str) -> String {
        match self {
            HazardClass::Vehicle => "Vehicle ahead".to_string(),
            HazardClass::Cyclist => "Cyclist ahead".to_string(),
            HazardClass::Animal => "Animal nearby".to_string(),
            HazardClass::Crowd => "Crowd ahead".to_string(),
            HazardClass::Person => "Person nearby".to_string(),
            HazardClass::Other => {
                let mut chars = label.chars();
                match chars.next() {
                    Some(first) => format!("{}{} ahead", first.to_uppercase(), chars.as_str()),
                    None => "Obstacle ahead".to_string(),
                }
            }
        }
    }
}
