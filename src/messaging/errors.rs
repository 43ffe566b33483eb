use crate::event_sourcing::RegistryError;

// ============================================================================
// Messaging Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("could not connect to transport: {0}")]
    Connect(String),

    #[error("could not publish to transport: {0}")]
    Publish(String),

    #[error("could not subscribe to channel {channel}: {reason}")]
    Subscribe { channel: String, reason: String },

    #[error("transport circuit breaker is open")]
    CircuitOpen,
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("handler {handler} is already registered for {event_type}")]
    DuplicateHandlerRegistration { handler: String, event_type: String },

    #[error("event bus could not connect: {0}")]
    TransportConnect(#[source] TransportError),

    #[error("event bus could not publish: {0}")]
    PublishTransport(#[source] TransportError),

    #[error("could not encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("event bus is closed")]
    Closed,
}
