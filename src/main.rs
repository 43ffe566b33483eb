use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use event_relay::metrics::{self, Metrics};
use event_relay::{AppConfig, Event, EventBus, EventHandler, EventStore, MemoryEventStore};

// ============================================================================
// Demo: save events, publish them over Redis, observe them as a replica
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct AccountOpened {
    account_id: Uuid,
    owner: String,
}

impl Event for AccountOpened {
    fn aggregate_id(&self) -> Uuid {
        self.account_id
    }

    fn event_type(&self) -> &'static str {
        "AccountOpened"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct FundsDeposited {
    account_id: Uuid,
    amount: i64,
}

impl Event for FundsDeposited {
    fn aggregate_id(&self) -> Uuid {
        self.account_id
    }

    fn event_type(&self) -> &'static str {
        "FundsDeposited"
    }
}

struct LoggingHandler {
    name: &'static str,
}

#[async_trait]
impl EventHandler for LoggingHandler {
    fn name(&self) -> &str {
        self.name
    }

    async fn handle_event(&self, event: Arc<dyn Event>) {
        tracing::info!(
            handler = self.name,
            event_type = event.event_type(),
            aggregate_id = %event.aggregate_id(),
            "📨 Received {:?}",
            event
        );
    }
}

async fn register_types(bus: &EventBus) -> anyhow::Result<()> {
    bus.register_event_type(&AccountOpened::default(), || Box::new(AccountOpened::default()))
        .await?;
    bus.register_event_type(&FundsDeposited::default(), || Box::new(FundsDeposited::default()))
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,event_relay=debug")),
        )
        .init();

    let config = AppConfig::from_env();
    tracing::info!(bus = %config.bus.name, redis = %config.bus.redis_url, "🚀 Starting event relay demo");

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    let registry = metrics.registry().clone();
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Runtime::new() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!("Metrics runtime error: {}", e);
                return;
            }
        };
        runtime.block_on(async {
            if let Err(e) = metrics::start_metrics_server(registry, metrics_port).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    });

    // === 2. Two bus instances on the same channel, as two replicas would ===
    let bus = Arc::new(EventBus::connect(&config.bus, Some(metrics.clone())).await?);
    let replica = EventBus::connect(&config.bus, Some(metrics.clone())).await?;
    register_types(&bus).await?;
    register_types(&replica).await?;

    bus.add_local_handler(Arc::new(LoggingHandler { name: "local" })).await?;
    bus.add_handler(Arc::new(LoggingHandler { name: "deposits" }), "FundsDeposited")
        .await?;
    replica
        .add_global_handler(Arc::new(LoggingHandler { name: "replica-global" }))
        .await?;

    // === 3. Store publishes every saved event on the bus ===
    let store = MemoryEventStore::new()
        .with_publisher(bus.clone())
        .with_metrics(metrics.clone());

    let account_id = Uuid::new_v4();
    let opened: Arc<dyn Event> = Arc::new(AccountOpened { account_id, owner: "demo".to_string() });
    let first: Arc<dyn Event> = Arc::new(FundsDeposited { account_id, amount: 100 });
    let second: Arc<dyn Event> = Arc::new(FundsDeposited { account_id, amount: 250 });
    store.save(vec![opened, first]).await?;
    store.save(vec![second]).await?;

    for envelope in store.load(account_id).await? {
        tracing::info!(version = envelope.version, event_type = %envelope.event_type, "Stored");
    }

    // Let the replica's receive loop catch up
    tokio::time::sleep(Duration::from_secs(1)).await;

    bus.close().await;
    replica.close().await;

    tracing::info!("🎉 Demo complete!");
    Ok(())
}
