// Private module declaration
mod server;

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the store and the bus
// ============================================================================
//
// - events appended by the store
// - events published / failed per bus
// - events received from the transport, and payloads that failed to decode
// - handler invocations per bus and scope (local, typed, global)
//
// Scraped via /metrics when the metrics server is running.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub events_appended: IntCounter,

    pub events_published: IntCounterVec,
    pub publish_failures: IntCounterVec,
    pub events_received: IntCounterVec,
    pub decode_failures: IntCounterVec,
    pub handler_invocations: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let events_appended = IntCounter::new(
            "event_store_appended_total",
            "Total events appended to the event store",
        )?;
        registry.register(Box::new(events_appended.clone()))?;

        let events_published = IntCounterVec::new(
            Opts::new("event_bus_published_total", "Events published to the transport"),
            &["bus"],
        )?;
        registry.register(Box::new(events_published.clone()))?;

        let publish_failures = IntCounterVec::new(
            Opts::new("event_bus_publish_failures_total", "Events the transport refused"),
            &["bus"],
        )?;
        registry.register(Box::new(publish_failures.clone()))?;

        let events_received = IntCounterVec::new(
            Opts::new("event_bus_received_total", "Events received from the transport"),
            &["bus"],
        )?;
        registry.register(Box::new(events_received.clone()))?;

        let decode_failures = IntCounterVec::new(
            Opts::new(
                "event_bus_decode_failures_total",
                "Transport payloads dropped because they could not be decoded",
            ),
            &["bus"],
        )?;
        registry.register(Box::new(decode_failures.clone()))?;

        let handler_invocations = IntCounterVec::new(
            Opts::new("event_bus_handler_invocations_total", "Handler invocations"),
            &["bus", "scope"],
        )?;
        registry.register(Box::new(handler_invocations.clone()))?;

        Ok(Self {
            registry,
            events_appended,
            events_published,
            publish_failures,
            events_received,
            decode_failures,
            handler_invocations,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_events_appended(&self, count: usize) {
        self.events_appended.inc_by(count as u64);
    }

    pub fn record_publish(&self, bus: &str, success: bool) {
        if success {
            self.events_published.with_label_values(&[bus]).inc();
        } else {
            self.publish_failures.with_label_values(&[bus]).inc();
        }
    }

    pub fn record_received(&self, bus: &str) {
        self.events_received.with_label_values(&[bus]).inc();
    }

    pub fn record_decode_failure(&self, bus: &str) {
        self.decode_failures.with_label_values(&[bus]).inc();
    }

    pub fn record_handler_invocations(&self, bus: &str, scope: &str, count: usize) {
        if count > 0 {
            self.handler_invocations
                .with_label_values(&[bus, scope])
                .inc_by(count as u64);
        }
    }

    pub fn decode_failure_count(&self, bus: &str) -> u64 {
        self.decode_failures.with_label_values(&[bus]).get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_store_and_bus_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.record_events_appended(3);
        metrics.record_publish("orders", true);
        metrics.record_publish("orders", false);
        metrics.record_decode_failure("orders");

        let gathered = metrics.registry().gather();
        let appended = gathered
            .iter()
            .find(|m| m.name() == "event_store_appended_total")
            .unwrap();
        assert_eq!(appended.metric[0].counter.value, Some(3.0));

        assert_eq!(metrics.events_published.with_label_values(&["orders"]).get(), 1);
        assert_eq!(metrics.publish_failures.with_label_values(&["orders"]).get(), 1);
        assert_eq!(metrics.decode_failure_count("orders"), 1);
        assert_eq!(metrics.decode_failure_count("other"), 0);
    }

    #[test]
    fn test_handler_invocations_by_scope() {
        let metrics = Metrics::new().unwrap();
        metrics.record_handler_invocations("orders", "local", 2);
        metrics.record_handler_invocations("orders", "global", 0);

        assert_eq!(
            metrics
                .handler_invocations
                .with_label_values(&["orders", "local"])
                .get(),
            2
        );
    }
}
