//! Supervision: deciding on and carrying out remediation
//!
//! - Policy maps a sample and breaker state to one action
//! - Executors perform restart, cache clear and circuit break
//! - The orchestrator drives the probe / record / remediate cycle

pub mod executor;
pub mod orchestrator;
pub mod policy;

pub use executor::{build_executor, execute_action, HttpExecutor, LoggingExecutor, RemediationExecutor};
pub use orchestrator::{CycleReport, Orchestrator, TriggerHandle};
pub use policy::{Decision, PolicyConfig, RemediationPolicy};
