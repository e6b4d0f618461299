//! In-process progress transport.
//!
//! A tokio broadcast channel carries [`ProgressEvent`]s from the batch
//! orchestrator and workflows to any number of consumers (the CLI
//! printer today). Step outcomes are additionally retained in a bounded
//! ring buffer so a consumer that attaches late can still show recent
//! history without the bus ever growing unbounded.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use autot1_core_types::{ProgressEvent, StepOutcome};

#[derive(Debug, Error, Clone)]
pub enum BusError {
    #[error("event bus has no subscribers: {0}")]
    NoSubscribers(String),
}

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

#[async_trait]
pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), BusError>;
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// Broadcast-backed bus. Publishing with zero subscribers is not an
/// error for callers that treat progress as best-effort; they can ignore
/// the `NoSubscribers` result, which the workflows do.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }
}

#[async_trait]
impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), BusError> {
        self.sender
            .send(event)
            .map(|_| ())
            .map_err(|err| BusError::NoSubscribers(err.to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

/// Helper to materialise an mpsc receiver from the bus subscription
/// so callers can await events without handling broadcast semantics directly.
pub fn to_mpsc<E>(bus: Arc<InMemoryBus<E>>, capacity: usize) -> mpsc::Receiver<E>
where
    E: Event,
{
    let mut rx = bus.subscribe();
    let (tx, out_rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(async move {
        while let Ok(ev) = rx.recv().await {
            if tx.send(ev).await.is_err() {
                break;
            }
        }
    });
    out_rx
}

/// Bounded history of recent step outcomes. Oldest entries are evicted
/// once `capacity` is reached; the full stream only exists on the bus.
pub struct OutcomeHistory {
    capacity: usize,
    entries: Mutex<VecDeque<StepOutcome>>,
}

impl OutcomeHistory {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        })
    }

    pub fn push(&self, outcome: StepOutcome) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(outcome);
    }

    pub fn snapshot(&self) -> Vec<StepOutcome> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Convenience alias for the bus the whole application shares.
pub type ProgressBus = InMemoryBus<ProgressEvent>;

#[cfg(test)]
mod tests {
    use super::*;
    use autot1_core_types::WorkflowStep;

    #[tokio::test]
    async fn events_are_delivered_in_publish_order() {
        let bus: Arc<InMemoryBus<u32>> = InMemoryBus::new(16);
        let mut rx = bus.subscribe();
        for n in 0..5u32 {
            bus.publish(n).await.unwrap();
        }
        for n in 0..5u32 {
            assert_eq!(rx.recv().await.unwrap(), n);
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_reports_no_subscribers() {
        let bus: Arc<InMemoryBus<u32>> = InMemoryBus::new(4);
        assert!(matches!(
            bus.publish(1).await,
            Err(BusError::NoSubscribers(_))
        ));
    }

    #[tokio::test]
    async fn to_mpsc_forwards_events() {
        let bus: Arc<InMemoryBus<u32>> = InMemoryBus::new(8);
        let mut rx = to_mpsc(bus.clone(), 8);
        tokio::task::yield_now().await;
        bus.publish(7).await.unwrap();
        assert_eq!(rx.recv().await, Some(7));
    }

    #[test]
    fn history_evicts_oldest_beyond_capacity() {
        let history = OutcomeHistory::new(3);
        for step in [
            WorkflowStep::StartingDeclaration,
            WorkflowStep::SelectingMessageType,
            WorkflowStep::SelectingProfile,
            WorkflowStep::Confirming,
        ] {
            history.push(StepOutcome::ok(step, None));
        }
        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].step, WorkflowStep::SelectingMessageType);
        assert_eq!(snapshot[2].step, WorkflowStep::Confirming);
    }
}
