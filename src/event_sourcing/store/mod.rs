// ============================================================================
// Event Sourcing Store - Generic Persistence Layer
// ============================================================================
//
// The `EventStore` contract, its in-memory implementation and the tracing
// decorator used by tests.
//
// ============================================================================

pub mod event_store;
pub mod trace;

pub use event_store::{EventPublisher, EventStore, MemoryEventStore};
pub use trace::TraceEventStore;
