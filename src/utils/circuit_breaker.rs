use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

// ============================================================================
// Circuit Breaker
// ============================================================================
//
// Guards transport publishes. After `failure_threshold` consecutive failures
// the circuit opens and publishes fail immediately until `timeout` has
// passed; then a half-open probe decides whether to close it again.
//
// States:
// - Closed: calls pass through
// - Open: calls rejected
// - HalfOpen: probing after the timeout
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening
    pub failure_threshold: u32,
    /// Time spent open before probing
    pub timeout: Duration,
    /// Successful probes needed to close from half-open
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 3,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("operation failed: {0}")]
    OperationFailed(E),
}

struct Counters {
    state: CircuitState,
    failures: u32,
    successes: u32,
    opened_at: Option<Instant>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    counters: Arc<Mutex<Counters>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            counters: Arc::new(Mutex::new(Counters {
                state: CircuitState::Closed,
                failures: 0,
                successes: 0,
                opened_at: None,
            })),
        }
    }

    /// Run `operation` unless the circuit is open
    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        if !self.admit().await {
            return Err(CircuitBreakerError::CircuitOpen);
        }

        match operation.await {
            Ok(value) => {
                self.on_success().await;
                Ok(value)
            }
            Err(err) => {
                self.on_failure().await;
                Err(CircuitBreakerError::OperationFailed(err))
            }
        }
    }

    async fn admit(&self) -> bool {
        let mut counters = self.counters.lock().await;
        if counters.state != CircuitState::Open {
            return true;
        }

        let elapsed = counters
            .opened_at
            .map_or(true, |at| at.elapsed() >= self.config.timeout);
        if elapsed {
            tracing::info!(breaker = %self.name, "Circuit breaker half-open, probing");
            counters.state = CircuitState::HalfOpen;
            counters.successes = 0;
        }
        elapsed
    }

    async fn on_success(&self) {
        let mut counters = self.counters.lock().await;
        match counters.state {
            CircuitState::HalfOpen => {
                counters.successes += 1;
                if counters.successes >= self.config.success_threshold {
                    tracing::info!(breaker = %self.name, "Circuit breaker closed");
                    counters.state = CircuitState::Closed;
                    counters.failures = 0;
                    counters.successes = 0;
                    counters.opened_at = None;
                }
            }
            CircuitState::Closed => counters.failures = 0,
            CircuitState::Open => {}
        }
    }

    async fn on_failure(&self) {
        let mut counters = self.counters.lock().await;
        counters.failures += 1;

        let trip = match counters.state {
            CircuitState::Closed => counters.failures >= self.config.failure_threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };
        if trip {
            tracing::warn!(
                breaker = %self.name,
                failures = counters.failures,
                "Circuit breaker opened"
            );
            counters.state = CircuitState::Open;
            counters.successes = 0;
            counters.opened_at = Some(Instant::now());
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.counters.lock().await.state
    }

    pub async fn reset(&self) {
        let mut counters = self.counters.lock().await;
        counters.state = CircuitState::Closed;
        counters.failures = 0;
        counters.successes = 0;
        counters.opened_at = None;
    }
}
