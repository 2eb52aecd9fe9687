//! [`HazardLoop`] – composition root of the hazard pipeline.
//!
//! Owns the engine, the consumer half of the detection inbox, the detector
//! throttle and the [`HazardBus`].  The host calls [`HazardLoop::tick`] once
//! per rendered frame:
//!
//! 1. **Collect** – take the newest detector result from the inbox, if any.
//! 2. **Process** – run the full pipeline on fresh results, otherwise only
//!    sweep timed-out hazards.
//! 3. **Publish** – removals on [`Topic::Removals`], the ordered hazard list
//!    on [`Topic::Placements`].
//!
//! Between ticks the host asks [`HazardLoop::should_request_detection`]
//! whether the detector may be invoked again; results come back through the
//! [`InboxSender`] returned by [`HazardLoop::new`].
//!
//! # Example
//!
//! ```
//! use wayguard_perception::{RawDetection, TieredDepthResolver};
//! use wayguard_runtime::config::EngineConfig;
//! use wayguard_runtime::hazard_loop::HazardLoop;
//! use wayguard_runtime::inbox::DetectionBatch;
//! use wayguard_types::MotionSample;
//!
//! let (mut hazards, inbox) =
//!     HazardLoop::new(EngineConfig::default(), Box::new(TieredDepthResolver::new())).unwrap();
//!
//! assert!(hazards.should_request_detection(0.0));
//! inbox.deliver(DetectionBatch {
//!     query_ts: 0.0,
//!     detections: vec![RawDetection::new("bus", [0.4, 0.4, 0.2, 0.2], 0.8)],
//!     ..Default::default()
//! });
//! let out = hazards.tick(0.05, &MotionSample::default());
//! assert_eq!(out.hazards[0].label, "bus");
//! ```

use tracing::{debug, info};
use wayguard_middleware::{HazardBus, Topic};
use wayguard_perception::DepthResolver;
use wayguard_tracking::DetectionThrottle;
use wayguard_types::{HazardError, HazardEvent, HazardEventPayload, MotionSample};

use crate::config::EngineConfig;
use crate::engine::{FrameInput, HazardEngine, TickOutput};
use crate::inbox::{InboxReceiver, InboxSender, detection_inbox};

/// Source tag on every published [`HazardEvent`].
const EVENT_SOURCE: &str = "wayguard-runtime::hazard_loop";

pub struct HazardLoop {
    engine: HazardEngine,
    inbox: InboxReceiver,
    throttle: DetectionThrottle,
    bus: HazardBus,
}

impl HazardLoop {
    /// Validate `config` and build the loop plus the sender the detector
    /// task delivers its results through.
    ///
    /// # Errors
    ///
    /// [`HazardError::Config`] when `config` fails validation.
    pub fn new(
        config: EngineConfig,
        depth: Box<dyn DepthResolver>,
    ) -> Result<(Self, InboxSender), HazardError> {
        let throttle = DetectionThrottle::new(config.detect_interval_s);
        let detect_interval_s = config.detect_interval_s;
        let engine = HazardEngine::new(config, depth)?;
        let (sender, inbox) = detection_inbox();
        info!(detect_interval_s, "hazard loop ready");
        Ok((
            Self {
                engine,
                inbox,
                throttle,
                bus: HazardBus::default(),
            },
            sender,
        ))
    }

    /// A clone of the bus, for renderers to subscribe on.
    pub fn bus(&self) -> HazardBus {
        self.bus.clone()
    }

    pub fn engine(&self) -> &HazardEngine {
        &self.engine
    }

    /// `true` when the detector may be invoked at `now`.  A `true` answer
    /// counts as an invocation.
    pub fn should_request_detection(&mut self, now: f64) -> bool {
        self.throttle.try_acquire(now)
    }

    /// Advance the pipeline by one tick and publish the result.
    pub fn tick(&mut self, now: f64, motion: &MotionSample) -> TickOutput {
        let output = match self.inbox.take_latest() {
            Some(batch) => {
                let frame = FrameInput {
                    captured_at: batch.query_ts,
                    detections: batch.detections,
                    confirmation: batch.confirmation,
                    motion: *motion,
                };
                self.engine.process(&frame, now)
            }
            None => self.engine.idle(now, motion),
        };
        self.publish(&output);
        output
    }

    /// Tear down every marker, e.g. when navigation ends.
    pub fn shutdown(&mut self) -> Vec<String> {
        let removed = self.engine.reset();
        self.publish(&TickOutput {
            removed: removed.clone(),
            ..TickOutput::default()
        });
        removed
    }

    fn publish(&self, output: &TickOutput) {
        if !output.removed.is_empty() {
            let event = HazardEvent::new(
                EVENT_SOURCE,
                HazardEventPayload::Removed(output.removed.clone()),
            );
            if let Err(e) = self.bus.publish_to(Topic::Removals, event) {
                debug!(error = %e, "removals not delivered");
            }
        }
        let event = HazardEvent::new(
            EVENT_SOURCE,
            HazardEventPayload::Placements(output.hazards.clone()),
        );
        if let Err(e) = self.bus.publish_to(Topic::Placements, event) {
            debug!(error = %e, "placements not delivered");
        }
    }
}
