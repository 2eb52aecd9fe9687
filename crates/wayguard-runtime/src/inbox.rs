//! Most-recent-wins slot for asynchronous detector results.
//!
//! The detector runs off the tick thread and may finish out of order.  Each
//! query is tagged with the engine time it was issued at; the inbox only ever
//! holds the newest result, and a result older than what it already holds is
//! discarded.  Built on [`tokio::sync::watch`], which has exactly these
//! single-slot semantics.

use tokio::sync::watch;
use tracing::debug;
use wayguard_perception::RawDetection;
use wayguard_types::{BackendConfirmation, HazardError};

/// Result of one detector query, optionally joined by the backend's labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionBatch {
    /// Engine time at which the query was issued.
    pub query_ts: f64,
    pub detections: Vec<RawDetection>,
    pub confirmation: BackendConfirmation,
}

impl DetectionBatch {
    /// A failed query: no data for this tick.
    pub fn empty(query_ts: f64) -> Self {
        Self {
            query_ts,
            ..Self::default()
        }
    }
}

/// Create a connected sender/receiver pair.
pub fn detection_inbox() -> (InboxSender, InboxReceiver) {
    let (tx, rx) = watch::channel(None);
    (
        InboxSender { tx },
        InboxReceiver {
            rx,
            last_taken: None,
        },
    )
}

/// Producer half, handed to the detector task.  Cheap to clone.
#[derive(Debug, Clone)]
pub struct InboxSender {
    tx: watch::Sender<Option<DetectionBatch>>,
}

impl InboxSender {
    /// Offer a result.  Returns `false` when it is not newer than the batch
    /// already waiting and was therefore dropped.
    pub fn deliver(&self, batch: DetectionBatch) -> bool {
        let query_ts = batch.query_ts;
        let accepted = self.tx.send_if_modified(|slot| match slot {
            Some(current) if query_ts.is_nan() || query_ts <= current.query_ts => false,
            _ => {
                *slot = Some(batch);
                true
            }
        });
        if !accepted {
            debug!(query_ts, "discarding stale detection result");
        }
        accepted
    }
}

/// Consumer half, owned by the tick loop.
#[derive(Debug)]
pub struct InboxReceiver {
    rx: watch::Receiver<Option<DetectionBatch>>,
    last_taken: Option<f64>,
}

impl InboxReceiver {
    /// The newest batch not yet taken, if any.  Never blocks.
    pub fn take_latest(&mut self) -> Option<DetectionBatch> {
        let slot = self.rx.borrow_and_update();
        let batch = slot.as_ref()?;
        if self.last_taken.is_some_and(|t| batch.query_ts <= t) {
            return None;
        }
        self.last_taken = Some(batch.query_ts);
        Some(batch.clone())
    }

    /// Wait until a new batch is delivered.
    ///
    /// # Errors
    ///
    /// [`HazardError::Channel`] once every sender has been dropped.
    pub async fn changed(&mut self) -> Result<(), HazardError> {
        self.rx
            .changed()
            .await
            .map_err(|e| HazardError::Channel(format!("detection inbox closed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(ts: f64, label: &str) -> DetectionBatch {
        DetectionBatch {
            query_ts: ts,
            detections: vec![RawDetection::new(label, [0.4, 0.4, 0.2, 0.2], 0.9)],
            confirmation: BackendConfirmation::empty(),
        }
    }

    #[test]
    fn empty_inbox_yields_nothing() {
        let (_tx, mut rx) = detection_inbox();
        assert!(rx.take_latest().is_none());
    }

    #[test]
    fn newest_result_wins() {
        let (tx, mut rx) = detection_inbox();
        assert!(tx.deliver(batch(1.0, "car")));
        assert!(tx.deliver(batch(2.0, "dog")));
        let got = rx.take_latest().unwrap();
        assert_eq!(got.query_ts, 2.0);
        assert_eq!(got.detections[0].label, "dog");
    }

    #[test]
    fn late_result_is_discarded() {
        let (tx, mut rx) = detection_inbox();
        assert!(tx.deliver(batch(2.0, "dog")));
        assert!(!tx.deliver(batch(1.0, "car")));
        assert_eq!(rx.take_latest().unwrap().detections[0].label, "dog");
    }

    #[test]
    fn batch_is_taken_once() {
        let (tx, mut rx) = detection_inbox();
        tx.deliver(batch(1.0, "car"));
        assert!(rx.take_latest().is_some());
        assert!(rx.take_latest().is_none());
        tx.deliver(batch(1.5, "car"));
        assert_eq!(rx.take_latest().unwrap().query_ts, 1.5);
    }

    #[test]
    fn failed_query_is_an_empty_batch() {
        let (tx, mut rx) = detection_inbox();
        tx.deliver(DetectionBatch::empty(3.0));
        let got = rx.take_latest().unwrap();
        assert!(got.detections.is_empty());
        assert!(got.confirmation.is_empty());
    }

    #[tokio::test]
    async fn changed_wakes_on_delivery() -> Result<(), Box<dyn std::error::Error>> {
        let (tx, mut rx) = detection_inbox();
        let producer = tokio::spawn(async move {
            tx.deliver(batch(0.5, "bus"));
        });
        rx.changed().await?;
        assert_eq!(rx.take_latest().unwrap().query_ts, 0.5);
        producer.await?;
        Ok(())
    }

    #[tokio::test]
    async fn changed_errors_when_senders_are_gone() {
        let (tx, mut rx) = detection_inbox();
        drop(tx);
        assert!(matches!(rx.changed().await, Err(HazardError::Channel(_))));
    }
}
