//! Coordination Layer
//!
//! - Circuit breaker per monitored dependency
//! - Graceful shutdown handling for the orchestrator loop and API server

pub mod circuit_breaker;
pub mod shutdown;

pub use circuit_breaker::{
    BreakerTransition, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerState, CircuitState,
    TripReason,
};
pub use shutdown::{install_signal_handlers, ShutdownController, ShutdownListener, ShutdownSignal};
