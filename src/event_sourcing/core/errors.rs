// ============================================================================
// Event Sourcing Errors
// ============================================================================

/// Errors returned by `EventStore` implementations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("no events to append")]
    NoEventsToAppend,

    #[error("could not find events")]
    EventsNotFound,
}

/// Errors raised while registering or decoding event types.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("event type already registered: {0}")]
    DuplicateTypeRegistration(String),

    #[error("factory for {expected} produced a different type ({actual})")]
    TypeMismatch { expected: String, actual: String },

    #[error("event type not registered: {0}")]
    UnknownEventType(String),

    #[error("could not decode event payload: {0}")]
    Decode(#[from] serde_json::Error),
}
