use std::sync::Arc;

use async_trait::async_trait;

use crate::event_sourcing::Event;

/// Anything that reacts to events published on a bus.
///
/// The same handler can be registered as local, global or type-scoped.
/// Global handlers may see an event more than once (the transport is
/// at-least-once) and should tolerate duplicates.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs and registration errors
    fn name(&self) -> &str {
        "handler"
    }

    async fn handle_event(&self, event: Arc<dyn Event>);
}
