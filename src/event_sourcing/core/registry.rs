use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::errors::RegistryError;
use super::event::{Event, EventRecord};

// ============================================================================
// Event Registry - type name -> zero-value factory
// ============================================================================
//
// Decoding a payload needs a concrete type to decode into. The registry maps
// each event type name to a factory that builds a fresh zero value, which is
// then populated from the payload. It must be filled before any decode runs.
//
// ============================================================================

pub type EventFactory = Arc<dyn Fn() -> Box<dyn Event> + Send + Sync>;

#[derive(Clone, Default)]
pub struct EventRegistry {
    factories: HashMap<String, EventFactory>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory for `sample`'s event type.
    ///
    /// Fails if the type name is already taken, or if the factory builds a
    /// value of a different concrete type than `sample`.
    pub fn register<F>(&mut self, sample: &dyn Event, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Box<dyn Event> + Send + Sync + 'static,
    {
        let event_type = sample.event_type();
        if self.factories.contains_key(event_type) {
            return Err(RegistryError::DuplicateTypeRegistration(event_type.to_string()));
        }

        let produced = factory();
        if Any::type_id(produced.as_any()) != Any::type_id(sample.as_any()) {
            return Err(RegistryError::TypeMismatch {
                expected: event_type.to_string(),
                actual: produced.event_type().to_string(),
            });
        }

        self.factories.insert(event_type.to_string(), Arc::new(factory));
        tracing::debug!(event_type = %event_type, "Registered event type");
        Ok(())
    }

    pub fn is_registered(&self, event_type: &str) -> bool {
        self.factories.contains_key(event_type)
    }

    /// Build a zero-valued event of the given type
    pub fn create(&self, event_type: &str) -> Result<Box<dyn Event>, RegistryError> {
        self.factories
            .get(event_type)
            .map(|factory| factory())
            .ok_or_else(|| RegistryError::UnknownEventType(event_type.to_string()))
    }

    /// Rebuild an event from its type name and JSON payload
    pub fn decode(&self, record: EventRecord) -> Result<Arc<dyn Event>, RegistryError> {
        let mut event = self.create(&record.event_type)?;
        event.populate(record.payload)?;
        Ok(Arc::from(event))
    }

    pub fn event_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.factories.clear();
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("event_types", &self.event_types())
            .finish()
    }
}
