use dashmap::DashMap;
use locallab_core::ExperimentId;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::events::ProgressEvent;

pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Per-experiment broadcast topics for progress events.
///
/// Publishing never fails and never blocks: with no subscribers the event is
/// dropped, and slow subscribers lag rather than stall the run loop.
#[derive(Debug)]
pub struct ProgressPublisher {
    topics: DashMap<ExperimentId, broadcast::Sender<ProgressEvent>>,
    capacity: usize,
}

impl Default for ProgressPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

impl ProgressPublisher {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self, experiment_id: ExperimentId) -> broadcast::Receiver<ProgressEvent> {
        self.topics
            .entry(experiment_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Like [`subscribe`](Self::subscribe), but the returned handle prunes
    /// the topic when dropped, whether or not it was ever read.
    pub fn watch(self: &Arc<Self>, experiment_id: ExperimentId) -> Subscription {
        Subscription {
            events: Some(self.subscribe(experiment_id)),
            publisher: Arc::clone(self),
            experiment_id,
        }
    }

    pub fn publish(&self, event: ProgressEvent) {
        let experiment_id = event.experiment_id;
        let kind = event.kind();

        let Some(sender) = self.topics.get(&experiment_id).map(|s| s.value().clone()) else {
            tracing::debug!(%experiment_id, kind, "No subscribers, dropping event");
            return;
        };

        if let Err(e) = sender.send(event) {
            tracing::debug!(%experiment_id, kind, "Event not delivered: {}", e);
        }
    }

    /// Drop the topic of an experiment once nobody listens to it anymore.
    pub fn prune(&self, experiment_id: &ExperimentId) {
        self.topics
            .remove_if(experiment_id, |_, sender| sender.receiver_count() == 0);
    }

    pub fn subscriber_count(&self, experiment_id: &ExperimentId) -> usize {
        self.topics
            .get(experiment_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

/// Receiver for one experiment's topic, owned by a stream consumer.
pub struct Subscription {
    publisher: Arc<ProgressPublisher>,
    experiment_id: ExperimentId,
    events: Option<broadcast::Receiver<ProgressEvent>>,
}

impl Subscription {
    pub fn experiment_id(&self) -> ExperimentId {
        self.experiment_id
    }

    pub async fn recv(&mut self) -> Result<ProgressEvent, RecvError> {
        match self.events.as_mut() {
            Some(events) => events.recv().await,
            None => Err(RecvError::Closed),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // The receiver must be gone before pruning or it still counts.
        self.events.take();
        self.publisher.prune(&self.experiment_id);
    }
}
