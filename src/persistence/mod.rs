//! Persistence for the remediation audit trail
//!
//! Memory, JSON-lines file and PostgreSQL backends behind one trait.

pub mod event_store;

pub use event_store::{build_event_store, EventStore, JsonlEventStore, MemoryEventStore, PgEventStore};
