//! `wayguard-middleware` – delivery of hazard output to renderers.
//!
//! # Modules
//!
//! - [`bus`] – topic-based publish/subscribe [`HazardBus`] built on Tokio
//!   broadcast channels.

pub mod bus;

pub use bus::{HazardBus, Topic, TopicReceiver};
