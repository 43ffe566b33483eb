// ============================================================================
// Messaging - event bus and pub/sub transports
// ============================================================================
//
// - transport.rs        Transport trait + in-process broadcast transport
// - redis_transport.rs  Redis pub/sub transport
// - handler.rs          EventHandler capability
// - event_bus.rs        hybrid local/global event bus
//
// ============================================================================

mod errors;
mod event_bus;
mod handler;
mod redis_transport;
mod transport;

pub use errors::{BusError, TransportError};
pub use event_bus::EventBus;
pub use handler::EventHandler;
pub use redis_transport::RedisTransport;
pub use transport::{InMemoryTransport, MessageStream, Transport};
