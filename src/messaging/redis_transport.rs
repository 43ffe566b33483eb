use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use super::errors::TransportError;
use super::transport::{MessageStream, Transport};
use crate::config::BusConfig;
use crate::utils::{retry_with_backoff, CircuitBreaker, CircuitBreakerError, CircuitState};

// ============================================================================
// Redis Pub/Sub Transport
// ============================================================================
//
// - PUBLISH goes through one multiplexed connection, guarded by a circuit
//   breaker so a dead Redis fails publishes fast instead of stalling callers
// - every subscription gets its own pub/sub connection
//
// Redis pub/sub is fire-and-forget: subscribers that are disconnected when a
// message is published never see it.
//
// ============================================================================

pub struct RedisTransport {
    client: redis::Client,
    connection: MultiplexedConnection,
    circuit_breaker: CircuitBreaker,
}

impl RedisTransport {
    /// Connect to Redis, retrying per `config.connect_retry`
    pub async fn connect(config: &BusConfig) -> Result<Self, TransportError> {
        let client = redis::Client::open(config.redis_connection_url())
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let connection = retry_with_backoff(&config.connect_retry, "redis_connect", |_attempt| {
            let client = client.clone();
            async move { client.get_multiplexed_async_connection().await }
        })
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::info!(url = %config.redis_url, bus = %config.name, "Connected to Redis");

        Ok(Self {
            client,
            connection,
            circuit_breaker: CircuitBreaker::new(
                format!("redis-publish:{}", config.name),
                config.circuit_breaker.clone(),
            ),
        })
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state().await
    }

    pub async fn reset_circuit_breaker(&self) {
        self.circuit_breaker.reset().await;
    }
}

#[async_trait]
impl Transport for RedisTransport {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let mut connection = self.connection.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let receivers: i64 = connection.publish(channel, payload).await?;
                Ok::<_, redis::RedisError>(receivers)
            })
            .await;

        match result {
            Ok(receivers) => {
                tracing::debug!(channel = %channel, receivers = receivers, "Published to Redis");
                Ok(())
            }
            Err(CircuitBreakerError::CircuitOpen) => {
                tracing::error!(channel = %channel, "Circuit breaker open - Redis unavailable");
                Err(TransportError::CircuitOpen)
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                tracing::error!(channel = %channel, error = %e, "Failed to publish to Redis");
                Err(TransportError::Publish(e.to_string()))
            }
        }
    }

    async fn subscribe(&self, channel: &str) -> Result<MessageStream, TransportError> {
        let subscribe_error = |e: redis::RedisError| TransportError::Subscribe {
            channel: channel.to_string(),
            reason: e.to_string(),
        };

        let mut pubsub = self.client.get_async_pubsub().await.map_err(subscribe_error)?;
        pubsub.subscribe(channel).await.map_err(subscribe_error)?;

        tracing::info!(channel = %channel, "Subscribed to Redis channel");

        let messages = pubsub
            .into_on_message()
            .map(|message| message.get_payload_bytes().to_vec());
        Ok(messages.boxed())
    }
}
