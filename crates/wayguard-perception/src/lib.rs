//! `wayguard-perception` – the stateless half of the hazard pipeline, plus
//! the per-label velocity memory.
//!
//! Turns one frame of noisy detector output into a short, ranked list of
//! fused hazards.
//!
//! # Modules
//!
//! - [`normalize`] – [`RawDetection`][normalize::RawDetection] →
//!   [`Candidate`][wayguard_types::Candidate]; drops NaN/∞ input.
//! - [`backend`] – typed parsing of backend confirmation payloads and their
//!   JSON Schema.
//! - [`class`] – [`HazardClass`][class::HazardClass]: label grouping, base
//!   scores and explanations.
//! - [`filter`] – relevance/size filter, contextual suppressor, crowd
//!   clusterer and forward-cone filter.
//! - [`depth`] – [`DepthResolver`][depth::DepthResolver] and the
//!   sensor → monocular → heuristic [`TieredDepthResolver`][depth::TieredDepthResolver].
//! - [`velocity`] – [`VelocityTracker`][velocity::VelocityTracker]: one
//!   sample per label, approach/crossing signals.
//! - [`severity`] – scoring, stable ranking, top-K truncation.
//! - [`fusion`] – merges backend confirmations and motion boosts into the
//!   ranked candidates.

pub mod backend;
pub mod class;
pub mod depth;
pub mod filter;
pub mod fusion;
pub mod normalize;
pub mod severity;
pub mod velocity;

pub use class::HazardClass;
pub use depth::{DepthResolver, DepthSource, TieredDepthResolver};
pub use filter::FilterConfig;
pub use fusion::FusionConfig;
pub use normalize::RawDetection;
pub use severity::ScoringConfig;
pub use velocity::{Motion, VelocityReading, VelocityTracker};
