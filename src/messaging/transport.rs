use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::sync::{broadcast, Mutex};

use super::errors::TransportError;

// ============================================================================
// Pub/Sub Transport
// ============================================================================
//
// The bus only needs two things from a transport:
// - publish raw bytes on a named channel
// - subscribe to a channel and receive every payload published on it,
//   including the subscriber's own publishes
//
// Delivery is at-least-once and ordered per publisher. There is no
// deduplication.
//
// ============================================================================

pub type MessageStream = BoxStream<'static, Vec<u8>>;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Subscribe to `channel`. The subscription is active once this returns.
    async fn subscribe(&self, channel: &str) -> Result<MessageStream, TransportError>;
}

// ============================================================================
// In-process transport
// ============================================================================
//
// One tokio broadcast channel per channel name. Several buses created over
// clones of the same `InMemoryTransport` behave like replicas sharing a
// broker.
//
// ============================================================================

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct InMemoryTransport {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>>,
    available: Arc<AtomicBool>,
    capacity: usize,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// `capacity` bounds how far a slow subscriber may fall behind
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            available: Arc::new(AtomicBool::new(true)),
            capacity: capacity.max(1),
        }
    }

    /// Simulate a broker outage (or recovery) for every clone of this transport
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    async fn sender(&self, channel: &str) -> broadcast::Sender<Vec<u8>> {
        let mut channels = self.channels.lock().await;
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(TransportError::Publish("in-memory transport unavailable".to_string()));
        }

        // No subscribers is not an error, the message is simply dropped.
        let receivers = self.sender(channel).await.send(payload).unwrap_or(0);
        tracing::trace!(channel = %channel, receivers = receivers, "Published in memory");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<MessageStream, TransportError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(TransportError::Subscribe {
                channel: channel.to_string(),
                reason: "in-memory transport unavailable".to_string(),
            });
        }

        let receiver = self.sender(channel).await.subscribe();
        let channel = channel.to_string();

        let messages = stream::unfold(receiver, move |mut receiver| {
            let channel = channel.clone();
            async move {
                loop {
                    match receiver.recv().await {
                        Ok(payload) => return Some((payload, receiver)),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(
                                channel = %channel,
                                skipped = skipped,
                                "Subscriber lagged, messages skipped"
                            );
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        });

        Ok(messages.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fan_out_includes_publisher() {
        let transport = InMemoryTransport::new();
        let replica = transport.clone();

        let mut first = transport.subscribe("test:events").await.unwrap();
        let mut second = replica.subscribe("test:events").await.unwrap();

        transport.publish("test:events", b"hello".to_vec()).await.unwrap();

        assert_eq!(first.next().await, Some(b"hello".to_vec()));
        assert_eq!(second.next().await, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let transport = InMemoryTransport::new();
        let mut orders = transport.subscribe("orders:events").await.unwrap();

        transport.publish("billing:events", b"bill".to_vec()).await.unwrap();
        transport.publish("orders:events", b"order".to_vec()).await.unwrap();

        assert_eq!(orders.next().await, Some(b"order".to_vec()));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let transport = InMemoryTransport::new();
        assert!(transport.publish("nobody:events", vec![1, 2, 3]).await.is_ok());
    }

    #[tokio::test]
    async fn test_unavailable_transport_fails() {
        let transport = InMemoryTransport::new();
        transport.set_available(false);

        assert!(matches!(
            transport.publish("test:events", vec![]).await,
            Err(TransportError::Publish(_))
        ));
        assert!(matches!(
            transport.subscribe("test:events").await,
            Err(TransportError::Subscribe { .. })
        ));
    }
}
