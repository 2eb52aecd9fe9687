//! Typed, topic-based publish/subscribe bus for hazard output.
//!
//! Uses [`tokio::sync::broadcast`] channels so every renderer receives every
//! message and a slow one never blocks the engine.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Placements`] | Ordered hazard list with placements, once per tick |
//! | [`Topic::Removals`] | Ids evicted by the lifecycle tracker |

use tokio::sync::broadcast;
use tracing::warn;
use wayguard_types::{HazardError, HazardEvent};

/// Default channel capacity (events buffered before slow subscribers lag).
const DEFAULT_CAPACITY: usize = 64;

/// Routing lanes on the [`HazardBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Per-tick hazard list, replacing whatever the renderer showed before.
    Placements,
    /// Hazard ids whose markers must be torn down.
    Removals,
}

/// Shared hazard bus. Clones share the same underlying channels.
#[derive(Clone, Debug)]
pub struct HazardBus {
    placements: broadcast::Sender<HazardEvent>,
    removals: broadcast::Sender<HazardEvent>,
}

impl HazardBus {
    /// Create a bus whose topic channels each buffer `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (placements, _) = broadcast::channel(capacity.max(1));
        let (removals, _) = broadcast::channel(capacity.max(1));
        Self {
            placements,
            removals,
        }
    }

    /// Publish `event` on `topic`.
    ///
    /// Returns the number of receivers handed the event, or
    /// [`HazardError::Channel`] when nobody is subscribed to the topic.
    pub fn publish_to(&self, topic: Topic, event: HazardEvent) -> Result<usize, HazardError> {
        self.sender(topic)
            .send(event)
            .map_err(|_| HazardError::Channel(format!("no subscribers for topic {topic:?}")))
    }

    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.sender(topic).subscribe(),
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn receiver_count(&self, topic: Topic) -> usize {
        self.sender(topic).receiver_count()
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<HazardEvent> {
        match topic {
            Topic::Placements => &self.placements,
            Topic::Removals => &self.removals,
        }
    }
}

impl Default for HazardBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Receiver
// ────────────────────────────────────────────────────────────────────────────

/// Async receiver bound to one [`Topic`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<HazardEvent>,
}

impl TopicReceiver {
    /// Wait for the next event, surfacing `Lagged`/`Closed` to the caller.
    pub async fn recv(&mut self) -> Result<HazardEvent, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Wait for the next event, skipping over lag.
    ///
    /// A renderer only cares about the latest hazard list, so dropped
    /// intermediate events are logged and ignored.  Returns `None` once the
    /// bus is gone.
    pub async fn next_event(&mut self) -> Option<HazardEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "hazard subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking poll used by synchronous consumers such as the replay CLI.
    pub fn try_next(&mut self) -> Option<HazardEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "hazard subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}
