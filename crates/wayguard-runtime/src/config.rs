//! [`EngineConfig`] – every threshold and constant of the hazard pipeline.
//!
//! All fields are serde-defaulted, so a partial TOML table (or none at all)
//! yields the stock tuning.  Call [`EngineConfig::validate`] before handing
//! a hand-edited configuration to the engine.
//!
//! # Example
//!
//! ```
//! use wayguard_runtime::config::EngineConfig;
//!
//! let cfg = EngineConfig::default();
//! assert!(cfg.validate().is_ok());
//! assert_eq!(cfg.scoring.max_hazards, 3);
//! ```

use serde::{Deserialize, Serialize};
use wayguard_perception::{FilterConfig, FusionConfig, ScoringConfig};
use wayguard_tracking::{CadenceConfig, LifecycleConfig, ProjectorConfig};
use wayguard_types::HazardError;

/// Upper bound on the number of hazards shown at once.
pub const MAX_VISIBLE_HAZARDS: usize = 3;

/// Complete engine tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Approach speed (normalised units/s) above which a label is approaching.
    #[serde(default = "default_approach_threshold")]
    pub approach_threshold: f32,

    /// Minimum seconds between detector invocations.
    #[serde(default = "default_detect_interval_s")]
    pub detect_interval_s: f64,

    /// Velocity samples older than this are forgotten.
    #[serde(default = "default_velocity_max_age_s")]
    pub velocity_max_age_s: f64,

    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub fusion: FusionConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub cadence: CadenceConfig,
    #[serde(default)]
    pub projector: ProjectorConfig,
}

fn default_approach_threshold() -> f32 {
    0.015
}
fn default_detect_interval_s() -> f64 {
    0.25
}
fn default_velocity_max_age_s() -> f64 {
    2.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            approach_threshold: default_approach_threshold(),
            detect_interval_s: default_detect_interval_s(),
            velocity_max_age_s: default_velocity_max_age_s(),
            filter: FilterConfig::default(),
            scoring: ScoringConfig::default(),
            fusion: FusionConfig::default(),
            lifecycle: LifecycleConfig::default(),
            cadence: CadenceConfig::default(),
            projector: ProjectorConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Reject values the pipeline cannot honour.
    ///
    /// # Errors
    ///
    /// [`HazardError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), HazardError> {
        check(self.approach_threshold.is_finite(), "approach_threshold must be finite")?;

        let cone = self.filter.cone_width_deg;
        check(cone.is_finite() && cone > 0.0 && cone <= 360.0, "filter.cone_width_deg must be in (0, 360]")?;
        check(self.filter.min_area >= 0.0, "filter.min_area must be non-negative")?;
        check(self.filter.min_side >= 0.0, "filter.min_side must be non-negative")?;
        check(
            self.filter.stationary_speed_mps.is_finite() && self.filter.near_person_m.is_finite(),
            "filter.stationary_speed_mps and filter.near_person_m must be finite",
        )?;
        check(self.filter.crowd_threshold >= 1, "filter.crowd_threshold must be at least 1")?;

        let k = self.scoring.max_hazards;
        check(
            (1..=MAX_VISIBLE_HAZARDS).contains(&k),
            "scoring.max_hazards must be between 1 and 3",
        )?;
        check(self.scoring.boost_range_m > 0.0, "scoring.boost_range_m must be positive")?;
        check(
            all_finite(&[self.scoring.max_distance_boost, self.scoring.unknown_distance_boost]),
            "scoring boosts must be finite",
        )?;
        check(
            all_finite(&[
                self.fusion.backend_boost,
                self.fusion.approach_boost,
                self.fusion.crossing_boost,
                self.fusion.crossing_threshold,
            ]),
            "fusion boosts and crossing_threshold must be finite",
        )?;

        let life = &self.lifecycle;
        check(life.alpha > 0.0 && life.alpha <= 1.0, "lifecycle.alpha must be in (0, 1]")?;
        check(life.eviction_timeout_s > 0.0, "lifecycle.eviction_timeout_s must be positive")?;
        check(
            life.side_limit_m.is_finite() && life.side_limit_m >= 0.0,
            "lifecycle.side_limit_m must be finite and non-negative",
        )?;
        check(
            life.min_distance_m > 0.0
                && life.min_distance_m <= life.max_distance_m
                && life.max_distance_m.is_finite(),
            "lifecycle distance bounds must satisfy 0 < min <= max < inf",
        )?;

        let proj = &self.projector;
        check(
            proj.forward_m.is_finite() && proj.vertical_m.is_finite(),
            "projector.forward_m and projector.vertical_m must be finite",
        )?;
        check(
            proj.default_distance_m.is_finite() && proj.default_distance_m > 0.0,
            "projector.default_distance_m must be finite and positive",
        )?;

        check(self.cadence.min_interval_s >= 0.0, "cadence.min_interval_s must be non-negative")?;
        check(
            self.cadence.heading_threshold_deg.is_finite(),
            "cadence.heading_threshold_deg must be finite",
        )?;
        check(self.detect_interval_s >= 0.0, "detect_interval_s must be non-negative")?;
        check(self.velocity_max_age_s > 0.0, "velocity_max_age_s must be positive")?;
        Ok(())
    }
}

fn all_finite(values: &[f32]) -> bool {
    values.iter().all(|v| v.is_finite())
}

fn check(ok: bool, message: &str) -> Result<(), HazardError> {
    if ok {
        Ok(())
    } else {
        Err(HazardError::Config(message.to_string()))
    }
}
