use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::event_store::EventStore;
use crate::event_sourcing::core::{Event, EventEnvelope, StoreError};

// ============================================================================
// Trace Event Store - records saved events for test assertions
// ============================================================================
//
// Wraps any `EventStore`. While tracing is on, events that the wrapped store
// saved are also kept in an in-memory trace, in the order they were saved.
// Persistence, return values and errors are exactly those of the wrapped
// store; resetting or stopping the trace never touches persisted streams.
//
// ============================================================================

pub struct TraceEventStore<S> {
    inner: S,
    tracing: AtomicBool,
    trace: Mutex<Vec<Arc<dyn Event>>>,
}

impl<S: EventStore> TraceEventStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            tracing: AtomicBool::new(false),
            trace: Mutex::new(Vec::new()),
        }
    }

    pub fn start_tracing(&self) {
        self.tracing.store(true, Ordering::SeqCst);
    }

    pub fn stop_tracing(&self) {
        self.tracing.store(false, Ordering::SeqCst);
    }

    pub fn is_tracing(&self) -> bool {
        self.tracing.load(Ordering::SeqCst)
    }

    /// Snapshot of everything traced so far, in save order
    pub async fn get_trace(&self) -> Vec<Arc<dyn Event>> {
        self.trace.lock().await.clone()
    }

    pub async fn reset_trace(&self) {
        self.trace.lock().await.clear();
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S: EventStore> EventStore for TraceEventStore<S> {
    async fn save(&self, events: Vec<Arc<dyn Event>>) -> Result<Vec<EventEnvelope>, StoreError> {
        if !self.is_tracing() {
            return self.inner.save(events).await;
        }

        // Held across the wrapped save so concurrent traced saves are
        // recorded in the order they were versioned.
        let mut trace = self.trace.lock().await;
        let saved = self.inner.save(events.clone()).await?;
        trace.extend(events);
        Ok(saved)
    }

    async fn load(&self, aggregate_id: Uuid) -> Result<Vec<EventEnvelope>, StoreError> {
        self.inner.load(aggregate_id).await
    }

    async fn current_version(&self, aggregate_id: Uuid) -> u64 {
        self.inner.current_version(aggregate_id).await
    }
}
