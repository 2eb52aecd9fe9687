//! `wayguard-runtime` – wires the hazard pipeline into a per-tick loop.
//!
//! # Modules
//!
//! - [`config`] – [`EngineConfig`][config::EngineConfig]: every threshold of
//!   the pipeline, serde-defaulted and validated.
//! - [`engine`] – [`HazardEngine`][engine::HazardEngine]: normalize → filter
//!   → velocity → rank → fuse → lifecycle → project, with exclusively owned
//!   state.
//! - [`inbox`] – most-recent-wins slot that merges asynchronous detector
//!   results into the tick loop.
//! - [`hazard_loop`] – [`HazardLoop`][hazard_loop::HazardLoop]: composition
//!   root owning the engine, inbox, detector throttle and
//!   [`HazardBus`][wayguard_middleware::HazardBus].
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: `tracing`
//!   subscriber with optional OTLP span export.

pub mod config;
pub mod engine;
pub mod hazard_loop;
pub mod inbox;
pub mod telemetry;

pub use config::EngineConfig;
pub use engine::{FrameInput, HazardEngine, TickOutput};
pub use hazard_loop::HazardLoop;
pub use inbox::{DetectionBatch, InboxReceiver, InboxSender, detection_inbox};
pub use telemetry::{TracerProviderGuard, init_tracing};
