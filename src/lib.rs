pub mod api;
pub mod cli;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod monitor;
pub mod persistence;
pub mod supervisor;

pub use config::AppConfig;
pub use coordination::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerState, CircuitState, ShutdownController,
    ShutdownListener, ShutdownSignal,
};
pub use domain::{
    DependencyDescriptor, HealthSample, HealthStatus, IssueType, RemediationAction,
    RemediationEvent,
};
pub use error::{Result, VigilError};
pub use monitor::{HealthProbe, HealthRegistry, HttpProbe, SystemHealthSnapshot};
pub use persistence::{EventStore, JsonlEventStore, MemoryEventStore, PgEventStore};
pub use supervisor::{
    HttpExecutor, LoggingExecutor, Orchestrator, RemediationExecutor, RemediationPolicy,
    TriggerHandle,
};
