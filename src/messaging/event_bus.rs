use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;

use super::errors::BusError;
use super::handler::EventHandler;
use super::redis_transport::RedisTransport;
use super::transport::{MessageStream, Transport};
use crate::config::BusConfig;
use crate::event_sourcing::{Event, EventPublisher, EventRecord, EventRegistry, RegistryError};
use crate::metrics::Metrics;

// ============================================================================
// Hybrid Event Bus
// ============================================================================
//
// publish_event(event)
//   1. local handlers, in registration order        (inline, this instance)
//   2. handlers registered for event.event_type()   (inline, this instance)
//   3. encode + publish on "<name>:events"          (transport)
//
// receive loop (one task per bus)
//   transport payload -> decode via registry -> global handlers
//
// Every instance sharing a bus name subscribes to the same channel, so
// global handlers see events from all replicas, this one included. Local
// and typed handlers only fire on the instance that publishes.
//
// ============================================================================

type HandlerList = Vec<Arc<dyn EventHandler>>;

#[derive(Default)]
struct Handlers {
    local: HandlerList,
    global: HandlerList,
    typed: HashMap<String, HandlerList>,
}

impl Handlers {
    fn clear(&mut self) {
        self.local.clear();
        self.global.clear();
        self.typed.clear();
    }
}

fn same_handler(a: &Arc<dyn EventHandler>, b: &Arc<dyn EventHandler>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// State shared between the bus handle and its receive loop.
struct BusState {
    name: String,
    registry: RwLock<EventRegistry>,
    handlers: RwLock<Handlers>,
    metrics: Option<Arc<Metrics>>,
}

impl BusState {
    async fn decode(&self, payload: &[u8]) -> Result<Arc<dyn Event>, RegistryError> {
        let record = EventRecord::from_bytes(payload)?;
        self.registry.read().await.decode(record)
    }

    async fn handle_message(&self, payload: &[u8]) {
        if let Some(metrics) = &self.metrics {
            metrics.record_received(&self.name);
        }

        let event = match self.decode(payload).await {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(bus = %self.name, error = %e, "Dropping undecodable event");
                if let Some(metrics) = &self.metrics {
                    metrics.record_decode_failure(&self.name);
                }
                return;
            }
        };

        let global = self.handlers.read().await.global.clone();
        for handler in &global {
            handler.handle_event(event.clone()).await;
        }

        tracing::debug!(
            bus = %self.name,
            event_type = %event.event_type(),
            aggregate_id = %event.aggregate_id(),
            handlers = global.len(),
            "Delivered event to global handlers"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_handler_invocations(&self.name, "global", global.len());
        }
    }

    async fn receive_loop(self: Arc<Self>, mut messages: MessageStream, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(bus = %self.name, "Event bus receive loop started");

        loop {
            tokio::select! {
                // Err means the bus handle was dropped without close()
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                message = messages.next() => match message {
                    Some(payload) => self.handle_message(&payload).await,
                    None => {
                        tracing::warn!(bus = %self.name, "Transport subscription ended");
                        break;
                    }
                },
            }
        }

        tracing::info!(bus = %self.name, "Event bus receive loop stopped");
    }
}

pub struct EventBus {
    state: Arc<BusState>,
    channel: String,
    transport: Arc<dyn Transport>,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
    receive_loop: Mutex<Option<JoinHandle<()>>>,
}

impl EventBus {
    /// Create a bus on `transport` and start its receive loop.
    ///
    /// Fails with `TransportConnect` if the channel cannot be subscribed.
    pub async fn new(config: &BusConfig, transport: Arc<dyn Transport>) -> Result<Self, BusError> {
        Self::start(config, transport, None).await
    }

    pub async fn with_metrics(
        config: &BusConfig,
        transport: Arc<dyn Transport>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, BusError> {
        Self::start(config, transport, Some(metrics)).await
    }

    /// Create a bus backed by Redis pub/sub
    pub async fn connect(config: &BusConfig, metrics: Option<Arc<Metrics>>) -> Result<Self, BusError> {
        let transport = RedisTransport::connect(config)
            .await
            .map_err(BusError::TransportConnect)?;
        Self::start(config, Arc::new(transport), metrics).await
    }

    async fn start(
        config: &BusConfig,
        transport: Arc<dyn Transport>,
        metrics: Option<Arc<Metrics>>,
    ) -> Result<Self, BusError> {
        let channel = config.channel();
        let messages = transport
            .subscribe(&channel)
            .await
            .map_err(BusError::TransportConnect)?;

        let state = Arc::new(BusState {
            name: config.name.clone(),
            registry: RwLock::new(EventRegistry::new()),
            handlers: RwLock::new(Handlers::default()),
            metrics,
        });

        let (shutdown, shutdown_rx) = watch::channel(false);
        let receive_loop = tokio::spawn(state.clone().receive_loop(messages, shutdown_rx));

        tracing::info!(bus = %config.name, channel = %channel, "🚌 Event bus started");

        Ok(Self {
            state,
            channel,
            transport,
            closed: AtomicBool::new(false),
            shutdown,
            receive_loop: Mutex::new(Some(receive_loop)),
        })
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn metrics(&self) -> Option<&Arc<Metrics>> {
        self.state.metrics.as_ref()
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.is_closed() {
            Err(BusError::Closed)
        } else {
            Ok(())
        }
    }

    /// Register the factory used to decode `sample`'s type from the transport.
    pub async fn register_event_type<F>(&self, sample: &dyn Event, factory: F) -> Result<(), BusError>
    where
        F: Fn() -> Box<dyn Event> + Send + Sync + 'static,
    {
        self.ensure_open()?;
        self.state.registry.write().await.register(sample, factory)?;
        Ok(())
    }

    /// Register `handler` for events of `event_type` only.
    pub async fn add_handler(&self, handler: Arc<dyn EventHandler>, event_type: &str) -> Result<(), BusError> {
        self.ensure_open()?;
        let mut handlers = self.state.handlers.write().await;
        let registered = handlers.typed.entry(event_type.to_string()).or_default();

        if registered.iter().any(|existing| same_handler(existing, &handler)) {
            return Err(BusError::DuplicateHandlerRegistration {
                handler: handler.name().to_string(),
                event_type: event_type.to_string(),
            });
        }

        tracing::debug!(bus = %self.state.name, handler = %handler.name(), event_type = %event_type, "Added handler");
        registered.push(handler);
        Ok(())
    }

    /// Register a handler for every event published through this instance.
    pub async fn add_local_handler(&self, handler: Arc<dyn EventHandler>) -> Result<(), BusError> {
        self.ensure_open()?;
        tracing::debug!(bus = %self.state.name, handler = %handler.name(), "Added local handler");
        self.state.handlers.write().await.local.push(handler);
        Ok(())
    }

    /// Register a handler for every event relayed over the transport.
    pub async fn add_global_handler(&self, handler: Arc<dyn EventHandler>) -> Result<(), BusError> {
        self.ensure_open()?;
        tracing::debug!(bus = %self.state.name, handler = %handler.name(), "Added global handler");
        self.state.handlers.write().await.global.push(handler);
        Ok(())
    }

    /// Dispatch to local and typed handlers, then publish on the transport.
    ///
    /// Local dispatch has completed when this returns. A transport failure is
    /// returned as `PublishTransport`; handlers that already ran are not
    /// undone.
    pub async fn publish_event(&self, event: Arc<dyn Event>) -> Result<(), BusError> {
        self.ensure_open()?;

        let (local, typed) = {
            let handlers = self.state.handlers.read().await;
            let typed = handlers
                .typed
                .get(event.event_type())
                .cloned()
                .unwrap_or_default();
            (handlers.local.clone(), typed)
        };

        for handler in local.iter().chain(typed.iter()) {
            handler.handle_event(event.clone()).await;
        }

        let name = self.state.name.as_str();
        if let Some(metrics) = &self.state.metrics {
            metrics.record_handler_invocations(name, "local", local.len());
            metrics.record_handler_invocations(name, "typed", typed.len());
        }

        let payload = EventRecord::from_event(event.as_ref())?.to_bytes()?;
        let published = self.transport.publish(&self.channel, payload).await;

        if let Some(metrics) = &self.state.metrics {
            metrics.record_publish(name, published.is_ok());
        }
        published.map_err(BusError::PublishTransport)?;

        tracing::debug!(
            bus = %name,
            event_type = %event.event_type(),
            aggregate_id = %event.aggregate_id(),
            "Published event"
        );
        Ok(())
    }

    /// Stop the receive loop and drop all registrations.
    ///
    /// Calling it again is a no-op. Must not be awaited from inside a global
    /// handler of the same bus, since it waits for the receive loop to finish.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let _ = self.shutdown.send(true);
        let receive_loop = self.receive_loop.lock().await.take();
        if let Some(receive_loop) = receive_loop {
            if let Err(e) = receive_loop.await {
                tracing::warn!(bus = %self.state.name, error = %e, "Receive loop ended abnormally");
            }
        }

        self.state.handlers.write().await.clear();
        self.state.registry.write().await.clear();

        tracing::info!(bus = %self.state.name, "Event bus closed");
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish_event(&self, event: Arc<dyn Event>) -> anyhow::Result<()> {
        EventBus::publish_event(self, event).await.map_err(Into::into)
    }
}

// ============================================================================
// Tests
// ============================================================================
