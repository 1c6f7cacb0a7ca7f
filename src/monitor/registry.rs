//! Health Registry
//!
//! Process-wide map from dependency name to its descriptor, latest
//! sample and circuit breaker. The orchestrator is the only writer; the
//! API and CLI read snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

use crate::coordination::{BreakerTransition, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerState};
use crate::domain::{DependencyDescriptor, HealthSample, HealthStatus};
use crate::error::{Result, VigilError};

/// System-wide counts, recomputed once per completed cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HealthSummary {
    pub total: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub unknown: usize,
    /// (healthy + 0.5 * degraded) / total, 0.0 when nothing is registered
    pub overall_score: f64,
    pub cycle: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl HealthSummary {
    pub fn from_statuses<I>(statuses: I, cycle: u64, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = HealthStatus>,
    {
        let mut summary = HealthSummary {
            cycle,
            updated_at: Some(now),
            ..Default::default()
        };
        for status in statuses {
            summary.total += 1;
            match status {
                HealthStatus::Healthy => summary.healthy += 1,
                HealthStatus::Degraded => summary.degraded += 1,
                HealthStatus::Unhealthy => summary.unhealthy += 1,
                HealthStatus::Unknown => summary.unknown += 1,
            }
        }
        summary.overall_score = if summary.total > 0 {
            (summary.healthy as f64 + 0.5 * summary.degraded as f64) / summary.total as f64
        } else {
            0.0
        };
        summary
    }
}

/// Read-only view of one dependency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencySnapshot {
    pub name: String,
    pub endpoint: Url,
    /// `unknown` until the first probe lands
    pub status: HealthStatus,
    pub sample: Option<HealthSample>,
    pub breaker: CircuitBreakerState,
}

/// Best-effort system health report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealthSnapshot {
    pub summary: HealthSummary,
    pub dependencies: Vec<DependencySnapshot>,
    pub generated_at: DateTime<Utc>,
}

/// Result of recording one sample
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub breaker: CircuitBreakerState,
    pub transition: Option<BreakerTransition>,
}

#[derive(Debug)]
struct DependencyEntry {
    descriptor: DependencyDescriptor,
    sample: Option<HealthSample>,
    breaker: CircuitBreaker,
}

/// Samples written by one cycle, with the summary computed from them
#[derive(Debug, Clone, PartialEq)]
pub struct CycleRecord {
    pub recorded: Vec<(HealthSample, RecordOutcome)>,
    pub summary: HealthSummary,
}

/// Latest health and breaker state per dependency
pub struct HealthRegistry {
    breaker_config: CircuitBreakerConfig,
    entries: RwLock<BTreeMap<String, DependencyEntry>>,
    summary: RwLock<HealthSummary>,
}

impl HealthRegistry {
    pub fn new(breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            breaker_config,
            entries: RwLock::new(BTreeMap::new()),
            summary: RwLock::new(HealthSummary::default()),
        }
    }

    /// Build a registry pre-populated with `descriptors`
    pub async fn with_dependencies(
        breaker_config: CircuitBreakerConfig,
        descriptors: impl IntoIterator<Item = DependencyDescriptor>,
    ) -> Result<Self> {
        let registry = Self::new(breaker_config);
        for descriptor in descriptors {
            registry.register(descriptor).await?;
        }
        Ok(registry)
    }

    /// Register a dependency with a closed breaker
    pub async fn register(&self, descriptor: DependencyDescriptor) -> Result<()> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&descriptor.name) {
            return Err(VigilError::DependencyExists(descriptor.name));
        }
        info!("Registered dependency {} at {}", descriptor.name, descriptor.endpoint);
        entries.insert(
            descriptor.name.clone(),
            DependencyEntry {
                breaker: CircuitBreaker::new(&descriptor.name, self.breaker_config),
                descriptor,
                sample: None,
            },
        );
        Ok(())
    }

    /// Remove a dependency and its state; returns false if it was unknown
    pub async fn deregister(&self, name: &str) -> bool {
        let removed = self.entries.write().await.remove(name).is_some();
        if removed {
            info!("Deregistered dependency {}", name);
        }
        removed
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.entries.read().await.contains_key(name)
    }

    pub async fn descriptor(&self, name: &str) -> Option<DependencyDescriptor> {
        self.entries
            .read()
            .await
            .get(name)
            .map(|entry| entry.descriptor.clone())
    }

    pub async fn descriptors(&self) -> Vec<DependencyDescriptor> {
        self.entries
            .read()
            .await
            .values()
            .map(|entry| entry.descriptor.clone())
            .collect()
    }

    /// Record one cycle's samples and publish the new summary.
    ///
    /// Everything happens under a single write lock on the entries, so a
    /// snapshot sees either the whole previous cycle or the whole new one.
    /// Samples for dependencies deregistered mid-cycle are dropped.
    pub async fn record_cycle(&self, samples: Vec<HealthSample>, cycle: u64) -> CycleRecord {
        let mut entries = self.entries.write().await;
        let mut recorded = Vec::with_capacity(samples.len());

        for sample in samples {
            let Some(entry) = entries.get_mut(&sample.dependency) else {
                debug!("Dropping sample for unregistered dependency {}", sample.dependency);
                continue;
            };
            let transition = entry.breaker.update(sample.status, sample.checked_at);
            entry.sample = Some(sample.clone());
            let outcome = RecordOutcome {
                breaker: entry.breaker.snapshot(),
                transition,
            };
            recorded.push((sample, outcome));
        }

        let summary =
            HealthSummary::from_statuses(entries.values().map(entry_status), cycle, Utc::now());
        // Lock order is entries then summary, same as `snapshot`
        *self.summary.write().await = summary.clone();

        CycleRecord { recorded, summary }
    }

    pub async fn get(&self, name: &str) -> Option<HealthSample> {
        self.entries
            .read()
            .await
            .get(name)
            .and_then(|entry| entry.sample.clone())
    }

    /// Latest sample of every dependency that has been probed
    pub async fn all(&self) -> BTreeMap<String, HealthSample> {
        self.entries
            .read()
            .await
            .iter()
            .filter_map(|(name, entry)| entry.sample.clone().map(|s| (name.clone(), s)))
            .collect()
    }

    pub async fn breaker(&self, name: &str) -> Option<CircuitBreakerState> {
        self.entries
            .read()
            .await
            .get(name)
            .map(|entry| entry.breaker.snapshot())
    }

    /// Open a dependency's breaker after a circuit-break action
    pub async fn force_open(&self, name: &str, now: DateTime<Utc>) -> Option<CircuitBreakerState> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(name)?;
        entry.breaker.force_open(now);
        Some(entry.breaker.snapshot())
    }

    /// Manually close a dependency's breaker
    pub async fn reset_breaker(&self, name: &str) -> Option<CircuitBreakerState> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(name)?;
        entry.breaker.reset();
        Some(entry.breaker.snapshot())
    }

    pub async fn summary(&self) -> HealthSummary {
        self.summary.read().await.clone()
    }

    /// Best-effort snapshot; never-probed dependencies report `unknown`
    pub async fn snapshot(&self) -> SystemHealthSnapshot {
        let entries = self.entries.read().await;
        let dependencies = entries
            .values()
            .map(|entry| DependencySnapshot {
                name: entry.descriptor.name.clone(),
                endpoint: entry.descriptor.endpoint.clone(),
                status: entry_status(entry),
                sample: entry.sample.clone(),
                breaker: entry.breaker.snapshot(),
            })
            .collect();

        // Read while the entries are still locked so both come from one cycle
        let summary = self.summary().await;
        drop(entries);

        SystemHealthSnapshot {
            summary,
            dependencies,
            generated_at: Utc::now(),
        }
    }
}

fn entry_status(entry: &DependencyEntry) -> HealthStatus {
    entry
        .sample
        .as_ref()
        .map(|s| s.status)
        .unwrap_or(HealthStatus::Unknown)
}
