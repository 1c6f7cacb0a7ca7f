//! Self-healing orchestrator
//!
//! One cooperative loop per process. Every cycle probes all registered
//! dependencies concurrently, records the samples, recomputes the system
//! summary and then runs a remediation pass over that same cycle's
//! samples. At most one remediation per dependency is in flight at a time,
//! whether it came from the loop or from a manual trigger.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::coordination::{CircuitBreakerState, CircuitState, ShutdownListener};
use crate::domain::{DependencyDescriptor, HealthSample, IssueType, RemediationAction, RemediationEvent};
use crate::error::{Result, VigilError};
use crate::monitor::{CycleRecord, HealthProbe, HealthRegistry, RecordOutcome, SystemHealthSnapshot};
use crate::persistence::EventStore;

use super::executor::{execute_action, RemediationExecutor};
use super::policy::RemediationPolicy;

/// Counts from one completed cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub probed: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub overall_score: f64,
    /// Remediations executed by this cycle's pass
    pub remediations: usize,
    pub failed_remediations: usize,
    /// Dependencies passed over because a remediation was already running
    pub skipped: usize,
    #[serde(rename = "duration_ms", with = "crate::domain::duration_ms")]
    pub duration: Duration,
}

enum PassOutcome {
    Idle,
    Skipped,
    Remediated(RemediationEvent),
}

/// Per-dependency in-progress flag, released on drop (including abort)
struct RemediationGuard {
    in_progress: Arc<DashMap<String, ()>>,
    dependency: String,
}

impl RemediationGuard {
    fn try_acquire(in_progress: &Arc<DashMap<String, ()>>, dependency: &str) -> Option<Self> {
        match in_progress.entry(dependency.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(Self {
                    in_progress: Arc::clone(in_progress),
                    dependency: dependency.to_string(),
                })
            }
        }
    }
}

impl Drop for RemediationGuard {
    fn drop(&mut self) {
        self.in_progress.remove(&self.dependency);
    }
}

/// Handle to a manually triggered remediation running in the background
pub struct TriggerHandle {
    dependency: String,
    action: RemediationAction,
    task: JoinHandle<RemediationEvent>,
}

impl TriggerHandle {
    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    pub fn action(&self) -> RemediationAction {
        self.action
    }

    /// Wait for the remediation event
    pub async fn wait(self) -> Result<RemediationEvent> {
        self.task.await.map_err(|e| {
            if e.is_cancelled() {
                VigilError::Cancelled
            } else {
                VigilError::Internal(format!("remediation task failed: {}", e))
            }
        })
    }

    /// Abort the remediation; the periodic loop is unaffected
    pub fn cancel(&self) {
        self.task.abort();
    }
}

pub struct Orchestrator {
    cycle_interval: Duration,
    policy: RemediationPolicy,
    registry: Arc<HealthRegistry>,
    probe: Arc<dyn HealthProbe>,
    executor: Arc<dyn RemediationExecutor>,
    store: Arc<dyn EventStore>,
    in_progress: Arc<DashMap<String, ()>>,
    /// Cycle number of the last remediation per dependency
    last_attempt: DashMap<String, u64>,
    cycle: AtomicU64,
}

impl Orchestrator {
    pub fn new(
        config: &AppConfig,
        registry: Arc<HealthRegistry>,
        probe: Arc<dyn HealthProbe>,
        executor: Arc<dyn RemediationExecutor>,
        store: Arc<dyn EventStore>,
    ) -> Self {
        Self {
            cycle_interval: config.cycle_interval(),
            policy: RemediationPolicy::new(config.policy.to_policy_config()),
            registry,
            probe,
            executor,
            store,
            in_progress: Arc::new(DashMap::new()),
            last_attempt: DashMap::new(),
            cycle: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<HealthRegistry> {
        &self.registry
    }

    pub fn cycle_interval(&self) -> Duration {
        self.cycle_interval
    }

    /// Number of completed or running cycles
    pub fn cycle(&self) -> u64 {
        self.cycle.load(Ordering::SeqCst)
    }

    pub fn is_remediating(&self, dependency: &str) -> bool {
        self.in_progress.contains_key(dependency)
    }

    /// Run cycles until shutdown is signaled. A running cycle is never
    /// interrupted; its probes finish or time out.
    pub async fn run(&self, mut shutdown: ShutdownListener) {
        let mut interval = tokio::time::interval(self.cycle_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "Orchestrator started, cycle interval {}s",
            self.cycle_interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                signal = shutdown.wait() => {
                    info!("Orchestrator stopping: {}", signal);
                    break;
                }
            }
            if shutdown.is_shutdown() {
                break;
            }

            let report = self.run_cycle().await;
            info!(
                "Cycle {} done in {}ms: {} probed, {} healthy, {} degraded, {} unhealthy, score {:.2}, {} remediations ({} failed, {} skipped)",
                report.cycle,
                report.duration.as_millis(),
                report.probed,
                report.healthy,
                report.degraded,
                report.unhealthy,
                report.overall_score,
                report.remediations,
                report.failed_remediations,
                report.skipped
            );
        }

        info!("Orchestrator stopped");
    }

    /// Probe everything, record, summarize, remediate
    pub async fn run_cycle(&self) -> CycleReport {
        let cycle = self.cycle.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();

        let descriptors = self.registry.descriptors().await;
        let samples = join_all(descriptors.iter().map(|d| self.probe.probe(d))).await;

        let CycleRecord { recorded, summary } = self.registry.record_cycle(samples, cycle).await;
        for (sample, outcome) in &recorded {
            if let Some(transition) = outcome.transition {
                info!(
                    "{} breaker {} -> {}",
                    sample.dependency, transition.from, transition.to
                );
            }
        }

        let outcomes = join_all(
            recorded
                .iter()
                .map(|(sample, outcome)| self.remediation_pass(sample, outcome, cycle)),
        )
        .await;

        let mut report = CycleReport {
            cycle,
            probed: recorded.len(),
            healthy: summary.healthy,
            degraded: summary.degraded,
            unhealthy: summary.unhealthy,
            overall_score: summary.overall_score,
            remediations: 0,
            failed_remediations: 0,
            skipped: 0,
            duration: Duration::ZERO,
        };
        for outcome in outcomes {
            match outcome {
                PassOutcome::Idle => {}
                PassOutcome::Skipped => report.skipped += 1,
                PassOutcome::Remediated(event) => {
                    report.remediations += 1;
                    if !event.success {
                        report.failed_remediations += 1;
                    }
                }
            }
        }
        report.duration = started.elapsed();
        report
    }

    async fn remediation_pass(
        &self,
        sample: &HealthSample,
        outcome: &RecordOutcome,
        cycle: u64,
    ) -> PassOutcome {
        let name = sample.dependency.as_str();

        // A trip during this cycle is the breaker's own circuit break
        let tripped = outcome
            .transition
            .is_some_and(|t| t.to == CircuitState::Open);
        let attempted = tripped
            || self
                .last_attempt
                .get(name)
                .is_some_and(|last| *last == cycle);

        let decision = self.policy.decide(sample, outcome.breaker.state, attempted);
        if decision.action.is_none() {
            return PassOutcome::Idle;
        }

        let Some(guard) = RemediationGuard::try_acquire(&self.in_progress, name) else {
            debug!("Remediation already in progress for {}, skipping", name);
            return PassOutcome::Skipped;
        };

        let mut details = sample.details();
        details.insert("triggered_by".into(), "policy".into());
        details.insert("cycle".into(), cycle.into());

        let event = self
            .remediate(name, decision.action, decision.issue, details, cycle)
            .await;
        drop(guard);
        PassOutcome::Remediated(event)
    }

    /// Execute one action and append its event. Never fails: executor
    /// errors become unsuccessful events and store errors are logged.
    async fn remediate(
        &self,
        name: &str,
        action: RemediationAction,
        issue: IssueType,
        mut details: serde_json::Map<String, serde_json::Value>,
        cycle: u64,
    ) -> RemediationEvent {
        info!("Remediating {}: {} ({})", name, action, issue);
        self.last_attempt.insert(name.to_string(), cycle);

        let (success, issue) = match execute_action(self.executor.as_ref(), action, name).await {
            Ok(success) => (success, issue),
            Err(e) => {
                error!("Remediation {} for {} raised: {}", action, name, e);
                details.insert("original_issue".into(), issue.as_str().into());
                details.insert("executor_error".into(), e.to_string().into());
                (false, IssueType::RemediationError)
            }
        };

        if success && action == RemediationAction::CircuitBreak {
            self.registry.force_open(name, Utc::now()).await;
        }
        if let Some(breaker) = self.registry.breaker(name).await {
            details.insert("breaker_state".into(), breaker.state.as_str().into());
            details.insert("failure_count".into(), breaker.failure_count.into());
        }

        let event = RemediationEvent::new(name, issue, action, success, details);
        if success {
            info!("Remediation {} for {} succeeded", action, name);
        } else {
            warn!("Remediation {} for {} failed", action, name);
        }

        if let Err(e) = self.store.append(&event).await {
            error!("Failed to record remediation event for {}: {}", name, e);
        }
        event
    }

    /// Start an out-of-band remediation for one dependency.
    ///
    /// The in-progress guard is taken before this returns, so a second
    /// trigger for the same dependency is rejected until the first ends.
    pub async fn trigger(
        self: &Arc<Self>,
        name: &str,
        action: RemediationAction,
    ) -> Result<TriggerHandle> {
        if action.is_none() {
            return Err(VigilError::InvalidAction(action.to_string()));
        }
        if !self.registry.contains(name).await {
            return Err(VigilError::DependencyNotFound(name.to_string()));
        }
        let guard = RemediationGuard::try_acquire(&self.in_progress, name)
            .ok_or_else(|| VigilError::RemediationInProgress(name.to_string()))?;

        let mut details = self
            .registry
            .get(name)
            .await
            .map(|sample| sample.details())
            .unwrap_or_default();
        details.insert("triggered_by".into(), "manual".into());

        info!("Manual {} triggered for {}", action, name);
        let this = Arc::clone(self);
        let dependency = name.to_string();
        let task = tokio::spawn(async move {
            let _guard = guard;
            let cycle = this.cycle();
            this.remediate(&dependency, action, IssueType::ManualTrigger, details, cycle)
                .await
        });

        Ok(TriggerHandle {
            dependency: name.to_string(),
            action,
            task,
        })
    }

    pub async fn register_dependency(&self, descriptor: DependencyDescriptor) -> Result<()> {
        self.registry.register(descriptor).await
    }

    /// Stop monitoring a dependency; its sample and breaker are dropped
    pub async fn deregister_dependency(&self, name: &str) -> Result<()> {
        if !self.registry.deregister(name).await {
            return Err(VigilError::DependencyNotFound(name.to_string()));
        }
        self.last_attempt.remove(name);
        Ok(())
    }

    pub async fn reset_breaker(&self, name: &str) -> Result<CircuitBreakerState> {
        self.registry
            .reset_breaker(name)
            .await
            .ok_or_else(|| VigilError::DependencyNotFound(name.to_string()))
    }

    pub async fn snapshot(&self) -> SystemHealthSnapshot {
        self.registry.snapshot().await
    }

    pub async fn events(&self, limit: usize, offset: usize) -> Result<Vec<RemediationEvent>> {
        self.store.recent(limit, offset).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::ShutdownController;
    use crate::domain::HealthStatus;
    use crate::persistence::MemoryEventStore;
    use crate::supervisor::executor::MockRemediationExecutor;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration};
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    /// Returns queued samples per dependency, healthy once a queue runs dry
    #[derive(Default)]
    struct ScriptedProbe {
        script: Mutex<HashMap<String, VecDeque<HealthSample>>>,
    }

    impl ScriptedProbe {
        fn push(&self, sample: HealthSample) {
            self.script
                .lock()
                .unwrap()
                .entry(sample.dependency.clone())
                .or_default()
                .push_back(sample);
        }
    }

    #[async_trait]
    impl HealthProbe for ScriptedProbe {
        async fn probe(&self, dependency: &DependencyDescriptor) -> HealthSample {
            self.script
                .lock()
                .unwrap()
                .get_mut(&dependency.name)
                .and_then(|queue| queue.pop_front())
                .unwrap_or_else(|| HealthSample::healthy(&dependency.name, Duration::from_millis(2)))
        }
    }

    /// Restarts block until the test releases a permit
    struct GatedExecutor {
        gate: Semaphore,
        calls: AtomicUsize,
    }

    impl GatedExecutor {
        fn new() -> Self {
            Self {
                gate: Semaphore::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RemediationExecutor for GatedExecutor {
        async fn restart(&self, _dependency: &str) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| VigilError::Internal(e.to_string()))?;
            Ok(true)
        }

        async fn clear_cache(&self, _dependency: &str) -> Result<bool> {
            Ok(true)
        }

        async fn circuit_break(&self, _dependency: &str) -> Result<bool> {
            Ok(true)
        }
    }

    const STORAGE: &str = "storage-service";

    fn refused(at: DateTime<Utc>) -> HealthSample {
        HealthSample::unhealthy(
            STORAGE,
            Duration::from_millis(12),
            "connection failed: tcp connect error: Connection refused",
        )
        .at(at)
    }

    async fn build(
        probe: Arc<ScriptedProbe>,
        executor: Arc<dyn RemediationExecutor>,
        threshold: u32,
    ) -> (Arc<Orchestrator>, Arc<MemoryEventStore>) {
        let mut config = AppConfig::default();
        config.breaker.failure_threshold = threshold;
        config.breaker.recovery_timeout_secs = 60;
        config.orchestrator.cycle_interval_secs = 1;

        let registry = Arc::new(
            HealthRegistry::with_dependencies(
                config.breaker.to_breaker_config(),
                [
                    DependencyDescriptor::parse(STORAGE, "http://storage-service:8004").unwrap(),
                    DependencyDescriptor::parse("cache-service", "http://cache-service:8003").unwrap(),
                ],
            )
            .await
            .unwrap(),
        );
        let store = Arc::new(MemoryEventStore::new());
        let orchestrator = Orchestrator::new(&config, registry, probe, executor, store.clone());
        (Arc::new(orchestrator), store)
    }

    #[tokio::test]
    async fn test_consecutive_failures_open_breaker_and_restart() {
        let probe = Arc::new(ScriptedProbe::default());
        let now = Utc::now();
        for i in 0..6 {
            probe.push(refused(now + ChronoDuration::seconds(i)));
        }

        let mut executor = MockRemediationExecutor::new();
        executor.expect_restart().times(5).returning(|_| Ok(false));
        executor.expect_circuit_break().times(1).returning(|_| Ok(true));
        let (orchestrator, store) = build(probe, Arc::new(executor), 5).await;

        for _ in 0..5 {
            orchestrator.run_cycle().await;
        }

        let breaker = orchestrator.registry().breaker(STORAGE).await.unwrap();
        assert_eq!(breaker.state, CircuitState::Open);
        assert_eq!(breaker.failure_count, 5);

        let events = store.recent(10, 0).await.unwrap();
        assert_eq!(events.len(), 5);
        let latest = &events[0];
        assert_eq!(latest.action, RemediationAction::Restart);
        assert_eq!(latest.issue, IssueType::ServiceUnhealthy);
        assert!(!latest.success);
        assert_eq!(latest.details["breaker_state"], "open");
        assert_eq!(latest.details["cycle"], 5);

        // Already open at the start of the next cycle: reaffirm it
        let report = orchestrator.run_cycle().await;
        assert_eq!(report.remediations, 1);
        let latest = &store.recent(1, 0).await.unwrap()[0];
        assert_eq!(latest.action, RemediationAction::CircuitBreak);
        assert_eq!(latest.issue, IssueType::CircuitOpen);
        assert!(latest.success);
    }

    #[tokio::test]
    async fn test_breaker_recovers_through_half_open() {
        let probe = Arc::new(ScriptedProbe::default());
        let base = Utc::now();
        let failure = |offset: i64| {
            HealthSample::unhealthy(STORAGE, Duration::from_millis(5), "http status 500")
                .with_status_code(500)
                .at(base + ChronoDuration::seconds(offset))
        };
        let healthy =
            |offset: i64| HealthSample::healthy(STORAGE, Duration::from_millis(5)).at(base + ChronoDuration::seconds(offset));

        probe.push(failure(0));
        probe.push(failure(1));
        probe.push(healthy(62));
        probe.push(healthy(63));
        probe.push(failure(64));
        probe.push(failure(65));

        // No rule matches a fast plain 500, so no executor call is expected
        let (orchestrator, store) = build(probe, Arc::new(MockRemediationExecutor::new()), 2).await;
        let registry = orchestrator.registry().clone();

        orchestrator.run_cycle().await;
        orchestrator.run_cycle().await;
        assert_eq!(registry.breaker(STORAGE).await.unwrap().state, CircuitState::Open);

        orchestrator.run_cycle().await;
        assert_eq!(registry.breaker(STORAGE).await.unwrap().state, CircuitState::HalfOpen);

        orchestrator.run_cycle().await;
        let breaker = registry.breaker(STORAGE).await.unwrap();
        assert_eq!(breaker.state, CircuitState::Closed);
        assert_eq!(breaker.failure_count, 0);

        orchestrator.run_cycle().await;
        let breaker = registry.breaker(STORAGE).await.unwrap();
        assert_eq!(breaker.state, CircuitState::Closed);
        assert_eq!(breaker.failure_count, 1);

        orchestrator.run_cycle().await;
        assert_eq!(registry.breaker(STORAGE).await.unwrap().state, CircuitState::Open);
        assert!(store.recent(10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cycle_records_fresh_samples_and_summary() {
        let probe = Arc::new(ScriptedProbe::default());
        probe.push(HealthSample::degraded(STORAGE, Duration::from_millis(800)));
        let (orchestrator, _store) = build(probe, Arc::new(MockRemediationExecutor::new()), 5).await;

        let before = Utc::now();
        let report = orchestrator.run_cycle().await;
        assert_eq!(report.cycle, 1);
        assert_eq!(report.probed, 2);
        assert_eq!(report.healthy, 1);
        assert_eq!(report.degraded, 1);
        assert!((report.overall_score - 0.75).abs() < f64::EPSILON);

        for (_, sample) in orchestrator.registry().all().await {
            assert!(sample.checked_at >= before);
        }
        assert_eq!(orchestrator.snapshot().await.summary.cycle, 1);
    }

    #[tokio::test]
    async fn test_executor_error_is_recorded_and_loop_continues() {
        let probe = Arc::new(ScriptedProbe::default());
        probe.push(refused(Utc::now()));
        probe.push(refused(Utc::now()));

        let mut executor = MockRemediationExecutor::new();
        executor
            .expect_restart()
            .times(2)
            .returning(|_| Err(VigilError::Executor("deploy api unreachable".to_string())));
        let (orchestrator, store) = build(probe, Arc::new(executor), 5).await;

        let first = orchestrator.run_cycle().await;
        assert_eq!(first.failed_remediations, 1);
        let second = orchestrator.run_cycle().await;
        assert_eq!(second.failed_remediations, 1);

        let event = &store.recent(1, 0).await.unwrap()[0];
        assert_eq!(event.issue, IssueType::RemediationError);
        assert!(!event.success);
        assert_eq!(event.details["original_issue"], "service_unhealthy");
    }

    #[tokio::test]
    async fn test_concurrent_manual_triggers_are_exclusive() {
        let probe = Arc::new(ScriptedProbe::default());
        let executor = Arc::new(GatedExecutor::new());
        let (orchestrator, store) = build(probe.clone(), executor.clone(), 5).await;

        let first = orchestrator
            .trigger("cache-service", RemediationAction::Restart)
            .await
            .unwrap();
        let second = orchestrator
            .trigger("cache-service", RemediationAction::Restart)
            .await;
        assert!(matches!(second, Err(VigilError::RemediationInProgress(name)) if name == "cache-service"));
        assert!(orchestrator.is_remediating("cache-service"));

        // The periodic pass also leaves it alone
        probe.push(
            HealthSample::unhealthy("cache-service", Duration::from_millis(3), "connection failed")
                .at(Utc::now()),
        );
        let report = orchestrator.run_cycle().await;
        assert_eq!(report.skipped, 1);

        executor.gate.add_permits(1);
        let event = first.wait().await.unwrap();
        assert_eq!(event.issue, IssueType::ManualTrigger);
        assert_eq!(event.details["triggered_by"], "manual");
        assert!(event.success);

        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.len().await, 1);
        assert!(!orchestrator.is_remediating("cache-service"));
    }

    #[tokio::test]
    async fn test_cancelled_trigger_releases_guard() {
        let executor = Arc::new(GatedExecutor::new());
        let (orchestrator, store) =
            build(Arc::new(ScriptedProbe::default()), executor.clone(), 5).await;

        let handle = orchestrator
            .trigger(STORAGE, RemediationAction::Restart)
            .await
            .unwrap();
        handle.cancel();
        assert!(matches!(handle.wait().await, Err(VigilError::Cancelled)));

        assert!(!orchestrator.is_remediating(STORAGE));
        assert_eq!(store.len().await, 0);
        assert!(orchestrator
            .trigger(STORAGE, RemediationAction::ClearCache)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_trigger_rejections() {
        let (orchestrator, _store) = build(
            Arc::new(ScriptedProbe::default()),
            Arc::new(MockRemediationExecutor::new()),
            5,
        )
        .await;

        let unknown = orchestrator.trigger("ghost", RemediationAction::Restart).await;
        assert!(matches!(unknown, Err(VigilError::DependencyNotFound(_))));

        let none = orchestrator.trigger(STORAGE, RemediationAction::None).await;
        assert!(matches!(none, Err(VigilError::InvalidAction(_))));
    }

    #[tokio::test]
    async fn test_manual_circuit_break_opens_breaker() {
        let mut executor = MockRemediationExecutor::new();
        executor.expect_circuit_break().times(1).returning(|_| Ok(true));
        let (orchestrator, _store) =
            build(Arc::new(ScriptedProbe::default()), Arc::new(executor), 5).await;

        let event = orchestrator
            .trigger(STORAGE, RemediationAction::CircuitBreak)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(event.details["breaker_state"], "open");

        let breaker = orchestrator.registry().breaker(STORAGE).await.unwrap();
        assert_eq!(breaker.state, CircuitState::Open);
        assert_eq!(breaker.failure_count, 5);

        let reset = orchestrator.reset_breaker(STORAGE).await.unwrap();
        assert_eq!(reset.state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_register_and_deregister() {
        let (orchestrator, _store) = build(
            Arc::new(ScriptedProbe::default()),
            Arc::new(MockRemediationExecutor::new()),
            5,
        )
        .await;

        let llm = DependencyDescriptor::parse("llm-service", "http://llm-service:8006").unwrap();
        orchestrator.register_dependency(llm.clone()).await.unwrap();
        assert!(matches!(
            orchestrator.register_dependency(llm).await,
            Err(VigilError::DependencyExists(_))
        ));

        let report = orchestrator.run_cycle().await;
        assert_eq!(report.probed, 3);

        orchestrator.deregister_dependency("llm-service").await.unwrap();
        assert!(matches!(
            orchestrator.deregister_dependency("llm-service").await,
            Err(VigilError::DependencyNotFound(_))
        ));
        let report = orchestrator.run_cycle().await;
        assert_eq!(report.probed, 2);
        assert!(orchestrator.snapshot().await.dependencies.iter().all(|d| d.name != "llm-service"));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (orchestrator, _store) = build(
            Arc::new(ScriptedProbe::default()),
            Arc::new(MockRemediationExecutor::new()),
            5,
        )
        .await;
        let shutdown = ShutdownController::new();
        let listener = shutdown.listener();

        let runner = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.run(listener).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.request_shutdown(crate::coordination::ShutdownSignal::Requested);

        tokio::time::timeout(Duration::from_secs(2), runner)
            .await
            .unwrap()
            .unwrap();
        // First tick fires immediately
        assert_eq!(orchestrator.cycle(), 1);
        assert_eq!(
            orchestrator.registry().get(STORAGE).await.unwrap().status,
            HealthStatus::Healthy
        );
    }
}
