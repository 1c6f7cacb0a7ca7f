//! Health monitoring: liveness probes and the registry of their results

pub mod probe;
pub mod registry;

pub use probe::{HealthProbe, HttpProbe};
pub use registry::{
    CycleRecord, DependencySnapshot, HealthRegistry, HealthSummary, RecordOutcome,
    SystemHealthSnapshot,
};
