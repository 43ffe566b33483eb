// ============================================================================
// Event Sourcing Core - Generic Event Abstractions
// ============================================================================
//
// Shared by the store and the bus:
// - `Event` / `EventEnvelope` / `EventRecord`
// - `EventRegistry` for decoding events by type name
// - error types
//
// No domain-specific events live here.
//
// ============================================================================

pub mod errors;
pub mod event;
pub mod registry;

pub use errors::{RegistryError, StoreError};
pub use event::{ErasedEvent, Event, EventEnvelope, EventRecord};
pub use registry::{EventFactory, EventRegistry};
