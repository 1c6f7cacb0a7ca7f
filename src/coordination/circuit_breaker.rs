//! Dependency Circuit Breaker
//!
//! One breaker per monitored dependency, fed by probe outcomes. The
//! breaker never calls the dependency itself; it only tracks whether
//! callers should avoid it.
//!
//! ```text
//! Closed   -> Open:     failure_count >= failure_threshold
//! Open     -> HalfOpen: recovery_timeout elapsed since opening
//! HalfOpen -> Closed:   healthy probe (failure_count reset to 0)
//! HalfOpen -> Open:     unhealthy probe
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::HealthStatus;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Failure threshold exceeded - calls should be short-circuited
    Open,
    /// Recovery window elapsed - next probe decides
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }

    /// Gauge value used by the metrics endpoint
    pub fn gauge(&self) -> u8 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::HalfOpen => 1,
            CircuitState::Open => 2,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a dependency circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of unhealthy probes (net of recovery credit) to trip the circuit
    pub failure_threshold: u32,
    /// Time to wait before transitioning from Open to HalfOpen
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

/// Trip reasons for the circuit breaker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TripReason {
    ConsecutiveFailures(u32),
    HalfOpenProbeFailed,
    ManualTrip,
}

impl std::fmt::Display for TripReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TripReason::ConsecutiveFailures(n) => write!(f, "{} consecutive failures", n),
            TripReason::HalfOpenProbeFailed => write!(f, "trial probe failed while half-open"),
            TripReason::ManualTrip => write!(f, "circuit break action"),
        }
    }
}

/// A state change reported by [`CircuitBreaker::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerTransition {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// Point-in-time copy of a breaker, as exposed to readers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub total_trips: u64,
    pub failure_threshold: u32,
    #[serde(rename = "recovery_timeout_ms", with = "crate::domain::duration_ms")]
    pub recovery_timeout: Duration,
}

/// Circuit breaker for one dependency
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<DateTime<Utc>>,
    opened_at: Option<DateTime<Utc>>,
    total_trips: u64,
}

impl CircuitBreaker {
    /// Create a closed breaker
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
            opened_at: None,
            total_trips: 0,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Feed one probe outcome into the state machine.
    ///
    /// An open breaker whose recovery window has elapsed moves to
    /// half-open and the outcome is otherwise ignored: the next probe is
    /// the trial.
    pub fn update(&mut self, status: HealthStatus, now: DateTime<Utc>) -> Option<BreakerTransition> {
        let from = self.state;

        if self.state == CircuitState::Open && self.recovery_elapsed(now) {
            self.state = CircuitState::HalfOpen;
            info!("Circuit breaker for {} transitioning to HALF-OPEN", self.name);
            return Some(BreakerTransition {
                from,
                to: CircuitState::HalfOpen,
            });
        }

        match status {
            HealthStatus::Unhealthy => {
                self.failure_count = self.failure_count.saturating_add(1);
                self.last_failure = Some(now);
                debug!("{} failure #{}", self.name, self.failure_count);

                match self.state {
                    CircuitState::HalfOpen => self.trip(TripReason::HalfOpenProbeFailed, now),
                    CircuitState::Closed if self.failure_count >= self.config.failure_threshold => {
                        self.trip(TripReason::ConsecutiveFailures(self.failure_count), now)
                    }
                    _ => {}
                }
            }
            HealthStatus::Healthy => match self.state {
                CircuitState::HalfOpen => self.close(),
                // Gradual recovery credit
                CircuitState::Closed => {
                    self.failure_count = self.failure_count.saturating_sub(1);
                }
                CircuitState::Open => {}
            },
            HealthStatus::Degraded | HealthStatus::Unknown => {}
        }

        (self.state != from).then_some(BreakerTransition {
            from,
            to: self.state,
        })
    }

    /// Open the circuit regardless of the failure count.
    ///
    /// The count is raised to the threshold so an open breaker always
    /// carries at least `failure_threshold` failures.
    pub fn force_open(&mut self, now: DateTime<Utc>) {
        self.failure_count = self.failure_count.max(self.config.failure_threshold);
        self.last_failure = Some(now);
        self.trip(TripReason::ManualTrip, now);
    }

    /// Force close the circuit (manual reset)
    pub fn reset(&mut self) {
        self.close();
        self.last_failure = None;
        warn!("Circuit breaker for {} force-closed", self.name);
    }

    pub fn snapshot(&self) -> CircuitBreakerState {
        CircuitBreakerState {
            state: self.state,
            failure_count: self.failure_count,
            last_failure: self.last_failure,
            opened_at: self.opened_at,
            total_trips: self.total_trips,
            failure_threshold: self.config.failure_threshold,
            recovery_timeout: self.config.recovery_timeout,
        }
    }

    fn trip(&mut self, reason: TripReason, now: DateTime<Utc>) {
        if self.state != CircuitState::Open {
            self.state = CircuitState::Open;
            self.opened_at = Some(now);
            self.total_trips += 1;
            warn!("Circuit breaker for {} OPEN: {}", self.name, reason);
        }
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.opened_at = None;
        info!("Circuit breaker for {} CLOSED - normal operation resumed", self.name);
    }

    fn recovery_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.opened_at
            .and_then(|opened| now.signed_duration_since(opened).to_std().ok())
            .is_some_and(|elapsed| elapsed >= self.config.recovery_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn breaker(threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "storage-service",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                recovery_timeout: Duration::from_secs(60),
            },
        )
    }

    #[test]
    fn test_circuit_breaker_initial_state() {
        let cb = breaker(5);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[test]
    fn test_circuit_breaker_trip_on_failures() {
        let mut cb = breaker(3);
        let now = Utc::now();

        assert_eq!(cb.update(HealthStatus::Unhealthy, now), None);
        assert_eq!(cb.update(HealthStatus::Unhealthy, now), None);
        assert_eq!(cb.state(), CircuitState::Closed);

        let transition = cb.update(HealthStatus::Unhealthy, now);
        assert_eq!(
            transition,
            Some(BreakerTransition {
                from: CircuitState::Closed,
                to: CircuitState::Open
            })
        );
        assert_eq!(cb.snapshot().opened_at, Some(now));
        assert_eq!(cb.snapshot().total_trips, 1);
    }

    #[test]
    fn test_healthy_gives_gradual_credit() {
        let mut cb = breaker(3);
        let now = Utc::now();

        cb.update(HealthStatus::Unhealthy, now);
        cb.update(HealthStatus::Unhealthy, now);
        cb.update(HealthStatus::Healthy, now);
        assert_eq!(cb.failure_count(), 1);

        // Credit never goes below zero
        cb.update(HealthStatus::Healthy, now);
        cb.update(HealthStatus::Healthy, now);
        assert_eq!(cb.failure_count(), 0);

        // Two more failures are not enough after the credit
        cb.update(HealthStatus::Unhealthy, now);
        cb.update(HealthStatus::Unhealthy, now);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_degraded_is_neutral() {
        let mut cb = breaker(2);
        let now = Utc::now();
        cb.update(HealthStatus::Unhealthy, now);
        cb.update(HealthStatus::Degraded, now);
        assert_eq!(cb.failure_count(), 1);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_open_stays_open_before_recovery_timeout() {
        let mut cb = breaker(1);
        let t0 = Utc::now();
        cb.update(HealthStatus::Unhealthy, t0);
        assert_eq!(cb.state(), CircuitState::Open);

        cb.update(HealthStatus::Healthy, t0 + ChronoDuration::seconds(30));
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.failure_count(), 1);
    }

    #[test]
    fn test_recovery_round_trip_goes_through_half_open() {
        let mut cb = breaker(5);
        let t0 = Utc::now();
        for _ in 0..5 {
            cb.update(HealthStatus::Unhealthy, t0);
        }
        assert_eq!(cb.state(), CircuitState::Open);

        // Any sample after the window moves to HalfOpen, never straight to Closed
        let t1 = t0 + ChronoDuration::seconds(61);
        let transition = cb.update(HealthStatus::Healthy, t1);
        assert_eq!(transition.map(|t| t.to), Some(CircuitState::HalfOpen));
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.update(HealthStatus::Healthy, t1 + ChronoDuration::seconds(30));
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);

        // Full threshold needed again
        for _ in 0..4 {
            cb.update(HealthStatus::Unhealthy, t1);
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.update(HealthStatus::Unhealthy, t1);
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.snapshot().total_trips, 2);
    }

    #[test]
    fn test_unhealthy_sample_after_window_still_only_half_opens() {
        let mut cb = breaker(1);
        let t0 = Utc::now();
        cb.update(HealthStatus::Unhealthy, t0);

        cb.update(HealthStatus::Unhealthy, t0 + ChronoDuration::seconds(61));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let mut cb = breaker(2);
        let t0 = Utc::now();
        cb.update(HealthStatus::Unhealthy, t0);
        cb.update(HealthStatus::Unhealthy, t0);
        let t1 = t0 + ChronoDuration::seconds(60);
        cb.update(HealthStatus::Healthy, t1);
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let transition = cb.update(HealthStatus::Unhealthy, t1);
        assert_eq!(
            transition,
            Some(BreakerTransition {
                from: CircuitState::HalfOpen,
                to: CircuitState::Open
            })
        );
        assert!(cb.failure_count() >= 2);
        assert_eq!(cb.snapshot().opened_at, Some(t1));
    }

    #[test]
    fn test_force_open_keeps_threshold_invariant() {
        let mut cb = breaker(5);
        let now = Utc::now();
        cb.force_open(now);
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.failure_count(), 5);

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
        assert!(cb.snapshot().last_failure.is_none());
    }

    #[test]
    fn test_failure_count_never_below_threshold_while_open() {
        let mut cb = breaker(3);
        let t0 = Utc::now();
        for step in 0..20 {
            let status = if step % 3 == 0 {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            };
            cb.update(status, t0 + ChronoDuration::seconds(step * 10));
            if cb.state() == CircuitState::Open {
                assert!(cb.failure_count() >= 3);
            }
        }
    }
}
