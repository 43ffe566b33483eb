use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Domain Event - the immutable fact
// ============================================================================
//
// Events travel through the store and the bus as `Arc<dyn Event>`. A concrete
// event only implements the two identity accessors below; the type-erased
// operations (payload encoding, zero-value population, downcasting, equality)
// come for free from the blanket `ErasedEvent` impl as long as the type is
// serde-serializable, cloneable and comparable.
//
// ============================================================================

/// A domain event that can be stored and published.
///
/// ```ignore
/// #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// struct OrderPlaced { id: Uuid, total: i64 }
///
/// impl Event for OrderPlaced {
///     fn aggregate_id(&self) -> Uuid { self.id }
///     fn event_type(&self) -> &'static str { "OrderPlaced" }
/// }
/// ```
pub trait Event: ErasedEvent + Debug + Send + Sync {
    /// Identifier of the aggregate whose stream this event belongs to
    fn aggregate_id(&self) -> Uuid;

    /// Discriminator used to find the factory when decoding
    fn event_type(&self) -> &'static str;
}

/// Object-safe operations every `Event` gets from its serde implementation.
pub trait ErasedEvent {
    fn as_any(&self) -> &dyn Any;

    /// Encode the event fields as JSON
    fn payload(&self) -> Result<serde_json::Value, serde_json::Error>;

    /// Overwrite this (usually zero-valued) instance with a decoded payload
    fn populate(&mut self, payload: serde_json::Value) -> Result<(), serde_json::Error>;

    fn clone_event(&self) -> Arc<dyn Event>;

    fn eq_event(&self, other: &dyn Event) -> bool;
}

impl<T> ErasedEvent for T
where
    T: Event + Serialize + DeserializeOwned + Clone + PartialEq + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn populate(&mut self, payload: serde_json::Value) -> Result<(), serde_json::Error> {
        *self = serde_json::from_value(payload)?;
        Ok(())
    }

    fn clone_event(&self) -> Arc<dyn Event> {
        Arc::new(self.clone())
    }

    fn eq_event(&self, other: &dyn Event) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }
}

impl dyn Event {
    pub fn downcast_ref<E: Event + 'static>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }

    pub fn is<E: Event + 'static>(&self) -> bool {
        self.as_any().is::<E>()
    }
}

impl PartialEq for dyn Event {
    fn eq(&self, other: &Self) -> bool {
        self.eq_event(other)
    }
}

// ============================================================================
// Event Envelope - what the store persists per stream entry
// ============================================================================

/// A saved event together with its store-assigned position.
#[derive(Clone, Debug)]
pub struct EventEnvelope {
    pub aggregate_id: Uuid,
    /// Position in the aggregate stream, starting at 1
    pub version: u64,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub event: Arc<dyn Event>,
}

impl EventEnvelope {
    pub fn new(version: u64, event: Arc<dyn Event>) -> Self {
        Self {
            aggregate_id: event.aggregate_id(),
            version,
            event_type: event.event_type().to_string(),
            timestamp: Utc::now(),
            event,
        }
    }
}

// ============================================================================
// Event Record - type name + payload, the form events take on the wire
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventRecord {
    pub event_type: String,
    pub payload: serde_json::Value,
}

impl EventRecord {
    pub fn from_event(event: &dyn Event) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_type: event.event_type().to_string(),
            payload: event.payload()?,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
