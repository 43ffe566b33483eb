// ============================================================================
// event_relay - event store + hybrid event bus
// ============================================================================
//
// - event_sourcing  events, registry, append-only store, trace decorator
// - messaging       event bus with local, typed and global handlers over a
//                   pub/sub transport (Redis or in-process)
// - config          bus / app configuration
// - metrics         Prometheus counters and the /metrics endpoint
// - utils           retry with backoff, circuit breaker
//
// ============================================================================

pub mod config;
pub mod event_sourcing;
pub mod messaging;
pub mod metrics;
pub mod utils;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{AppConfig, BusConfig};
pub use event_sourcing::{
    Event, EventEnvelope, EventPublisher, EventRecord, EventRegistry, EventStore, MemoryEventStore,
    RegistryError, StoreError, TraceEventStore,
};
pub use messaging::{BusError, EventBus, EventHandler, InMemoryTransport, RedisTransport, Transport, TransportError};
