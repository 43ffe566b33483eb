use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::event_sourcing::core::{Event, EventEnvelope, StoreError};
use crate::metrics::Metrics;

// ============================================================================
// Event Store - append-only streams, one per aggregate
// ============================================================================
//
// Responsibilities:
// 1. Assign versions (1, 2, 3, ...) per aggregate, never trusting the caller
// 2. Append events to the aggregate stream
// 3. Load the full ordered stream
// 4. Hand saved events to a downstream publisher (usually the event bus)
//
// ============================================================================

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append events, assigning each the next version of its aggregate.
    async fn save(&self, events: Vec<Arc<dyn Event>>) -> Result<Vec<EventEnvelope>, StoreError>;

    /// Load the whole stream of an aggregate in version order.
    async fn load(&self, aggregate_id: Uuid) -> Result<Vec<EventEnvelope>, StoreError>;

    /// Highest version saved for the aggregate, 0 if none
    async fn current_version(&self, aggregate_id: Uuid) -> u64;

    async fn aggregate_exists(&self, aggregate_id: Uuid) -> bool {
        self.current_version(aggregate_id).await > 0
    }
}

/// Downstream notification for saved events.
///
/// Publishing is best-effort: a failure is reported back to the store, which
/// logs it, but the append it follows is never undone. Saves are handed over
/// one at a time in version order, so a publisher must not save to the same
/// store from inside `publish_event`.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_event(&self, event: Arc<dyn Event>) -> anyhow::Result<()>;
}

// ============================================================================
// In-memory implementation
// ============================================================================

#[derive(Default)]
pub struct MemoryEventStore {
    streams: RwLock<HashMap<Uuid, Vec<EventEnvelope>>>,
    // Taken before the streams write lock is released, held while publishing
    publish_order: Mutex<()>,
    publisher: Option<Arc<dyn EventPublisher>>,
    metrics: Option<Arc<Metrics>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn publish(&self, saved: &[EventEnvelope]) {
        let Some(publisher) = &self.publisher else {
            return;
        };

        for envelope in saved {
            if let Err(e) = publisher.publish_event(envelope.event.clone()).await {
                tracing::warn!(
                    aggregate_id = %envelope.aggregate_id,
                    version = envelope.version,
                    event_type = %envelope.event_type,
                    error = %e,
                    "Failed to publish saved event"
                );
            }
        }
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn save(&self, events: Vec<Arc<dyn Event>>) -> Result<Vec<EventEnvelope>, StoreError> {
        if events.is_empty() {
            return Err(StoreError::NoEventsToAppend);
        }

        // The whole batch is versioned and appended under one write lock.
        // Publishing happens outside of it, but in version order.
        let (saved, _publish_order) = {
            let mut streams = self.streams.write().await;
            let mut saved = Vec::with_capacity(events.len());

            for event in events {
                let stream = streams.entry(event.aggregate_id()).or_default();
                let envelope = EventEnvelope::new(stream.len() as u64 + 1, event);
                stream.push(envelope.clone());
                saved.push(envelope);
            }

            (saved, self.publish_order.lock().await)
        };

        for envelope in &saved {
            tracing::debug!(
                aggregate_id = %envelope.aggregate_id,
                version = envelope.version,
                event_type = %envelope.event_type,
                "Appended event"
            );
        }
        tracing::info!(event_count = saved.len(), "✅ Saved events to event store");

        if let Some(metrics) = &self.metrics {
            metrics.record_events_appended(saved.len());
        }

        self.publish(&saved).await;

        Ok(saved)
    }

    async fn load(&self, aggregate_id: Uuid) -> Result<Vec<EventEnvelope>, StoreError> {
        let streams = self.streams.read().await;
        match streams.get(&aggregate_id) {
            Some(stream) if !stream.is_empty() => {
                tracing::debug!("Loaded {} events for aggregate {}", stream.len(), aggregate_id);
                Ok(stream.clone())
            }
            _ => Err(StoreError::EventsNotFound),
        }
    }

    async fn current_version(&self, aggregate_id: Uuid) -> u64 {
        let streams = self.streams.read().await;
        streams
            .get(&aggregate_id)
            .and_then(|stream| stream.last())
            .map_or(0, |envelope| envelope.version)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
