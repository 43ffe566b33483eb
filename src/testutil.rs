// ============================================================================
// Test fixtures shared by the unit tests
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::event_sourcing::{Event, EventEnvelope, EventPublisher};
use crate::messaging::EventHandler;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestEvent {
    pub id: Uuid,
    pub content: String,
}

impl TestEvent {
    pub fn new(id: Uuid, content: &str) -> Self {
        Self { id, content: content.to_string() }
    }
}

impl Event for TestEvent {
    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn event_type(&self) -> &'static str {
        "TestEvent"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestEventOther {
    pub id: Uuid,
    pub content: String,
}

impl TestEventOther {
    pub fn new(id: Uuid, content: &str) -> Self {
        Self { id, content: content.to_string() }
    }
}

impl Event for TestEventOther {
    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn event_type(&self) -> &'static str {
        "TestEventOther"
    }
}

pub fn events_of(envelopes: &[EventEnvelope]) -> Vec<Arc<dyn Event>> {
    envelopes.iter().map(|e| e.event.clone()).collect()
}

pub fn versions_of(envelopes: &[EventEnvelope]) -> Vec<u64> {
    envelopes.iter().map(|e| e.version).collect()
}

/// Handler that records every event and signals each delivery.
pub struct MockEventHandler {
    name: String,
    events: Mutex<Vec<Arc<dyn Event>>>,
    recv_tx: mpsc::UnboundedSender<()>,
    recv_rx: Mutex<mpsc::UnboundedReceiver<()>>,
}

impl MockEventHandler {
    pub fn new(name: &str) -> Arc<Self> {
        let (recv_tx, recv_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            name: name.to_string(),
            events: Mutex::new(Vec::new()),
            recv_tx,
            recv_rx: Mutex::new(recv_rx),
        })
    }

    pub async fn events(&self) -> Vec<Arc<dyn Event>> {
        self.events.lock().await.clone()
    }

    /// Wait for the next delivery, panicking after a few seconds
    pub async fn recv(&self) {
        let mut rx = self.recv_rx.lock().await;
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("handler channel closed");
    }

    /// True if a delivery arrives within `wait`
    pub async fn received_within(&self, wait: Duration) -> bool {
        let mut rx = self.recv_rx.lock().await;
        matches!(tokio::time::timeout(wait, rx.recv()).await, Ok(Some(())))
    }
}

#[async_trait]
impl EventHandler for MockEventHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle_event(&self, event: Arc<dyn Event>) {
        self.events.lock().await.push(event);
        let _ = self.recv_tx.send(());
    }
}

/// Publisher standing in for the event bus in store tests.
#[derive(Default)]
pub struct MockPublisher {
    events: Mutex<Vec<Arc<dyn Event>>>,
    fail: bool,
    slow_on: Option<(String, Duration)>,
}

impl MockPublisher {
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    /// Sleeps for `delay` before recording a `TestEvent` with this content
    pub fn slow_on(content: &str, delay: Duration) -> Self {
        Self { slow_on: Some((content.to_string(), delay)), ..Self::default() }
    }

    pub async fn events(&self) -> Vec<Arc<dyn Event>> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventPublisher for MockPublisher {
    async fn publish_event(&self, event: Arc<dyn Event>) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("publisher unavailable");
        }
        if let Some((content, delay)) = &self.slow_on {
            if event.downcast_ref::<TestEvent>().is_some_and(|e| &e.content == content) {
                tokio::time::sleep(*delay).await;
            }
        }
        self.events.lock().await.push(event);
        Ok(())
    }
}
