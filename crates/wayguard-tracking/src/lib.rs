//! `wayguard-tracking` – temporal stability and placement.
//!
//! Owns everything in the pipeline that remembers across frames apart from
//! the per-label velocity samples.
//!
//! # Modules
//!
//! - [`lifecycle`] – [`LifecycleTracker`][lifecycle::LifecycleTracker]:
//!   per-hazard-id store with EMA smoothing and timeout eviction.  It is the
//!   single writer of [`ActiveHazard`][lifecycle::ActiveHazard] state.
//! - [`cadence`] – [`CadenceGate`][cadence::CadenceGate] (when to recompute
//!   placements) and [`DetectionThrottle`][cadence::DetectionThrottle] (when
//!   the detector may run).
//! - [`projector`] – [`SpatialProjector`][projector::SpatialProjector]:
//!   hazard → camera-relative [`Placement`][wayguard_types::Placement].

pub mod cadence;
pub mod lifecycle;
pub mod projector;

pub use cadence::{CadenceConfig, CadenceGate, DetectionThrottle};
pub use lifecycle::{ActiveHazard, HazardState, HazardTarget, LifecycleConfig, LifecycleTracker};
pub use projector::{ProjectorConfig, SpatialProjector};
