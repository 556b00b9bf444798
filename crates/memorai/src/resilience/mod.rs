//! Timeouts, retries and circuit breakers for external dependencies
//!
//! Every call to an embedding provider or vector database goes through
//! [`ResilienceManager::call`], which takes a breaker permit, runs up to
//! `1 + max_retries` attempts (each under a timeout) and records exactly one
//! outcome on the dependency's breaker.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ResilienceConfig;
use crate::engine::TierKind;
use crate::error::{MemoraiError, Result};

/// What a dependency does for its tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyRole {
    Embedding,
    VectorStore,
}

impl DependencyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyRole::Embedding => "embedding",
            DependencyRole::VectorStore => "vector-store",
        }
    }
}

/// An external dependency guarded by its own breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Dependency {
    pub tier: TierKind,
    pub role: DependencyRole,
}

impl Dependency {
    pub fn embedding(tier: TierKind) -> Self {
        Self {
            tier,
            role: DependencyRole::Embedding,
        }
    }

    pub fn vector_store(tier: TierKind) -> Self {
        Self {
            tier,
            role: DependencyRole::VectorStore,
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tier, self.role.as_str())
    }
}

/// Breaker thresholds
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Failures within `failure_window` that trip the circuit
    pub failure_threshold: u32,
    /// Failures older than this are ignored
    pub failure_window: Duration,
    /// How long a tripped circuit rejects calls before allowing a probe
    pub cooldown: Duration,
}

impl BreakerConfig {
    pub fn from_config(config: &ResilienceConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            failure_window: Duration::from_secs(config.failure_window_secs),
            cooldown: Duration::from_secs(config.cooldown_secs),
        }
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self::from_config(&ResilienceConfig::default())
    }
}

/// Externally visible breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        })
    }
}

#[derive(Debug, Clone)]
enum State {
    /// Normal operation, tracking recent failures.
    Closed { failures: Vec<Instant> },
    /// Tripped. All calls are rejected until the cooldown expires.
    Open { opened_at: Instant },
    /// Cooldown expired. At most one probe call is in flight.
    HalfOpen { probe_in_flight: bool },
}

#[derive(Debug)]
struct BreakerInner {
    state: State,
    consecutive_failures: u32,
    last_failure_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of a breaker, used by health reports
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub dependency: String,
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub failure_threshold: u32,
    pub cooldown_ms: u64,
}

/// Thread-safe circuit breaker for a single dependency
#[derive(Debug)]
pub struct CircuitBreaker {
    dependency: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(dependency: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            dependency: dependency.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: State::Closed {
                    failures: Vec::new(),
                },
                consecutive_failures: 0,
                last_failure_at: None,
            }),
        }
    }

    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    // Breaker state stays consistent even if a holder panicked, so a
    // poisoned lock is recovered rather than propagated.
    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Ask to make a call.
    ///
    /// Closed circuits always grant a permit. Open circuits reject until the
    /// cooldown has elapsed, then grant a single half-open probe. While that
    /// probe is in flight every other caller is rejected.
    pub fn try_acquire(&self) -> Result<CallPermit<'_>> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match inner.state {
            State::Closed { .. } => Ok(CallPermit::new(self, false)),
            State::Open { opened_at } => {
                if opened_at.elapsed() >= self.config.cooldown {
                    info!(dependency = %self.dependency, "Circuit half-open, allowing probe call");
                    inner.state = State::HalfOpen {
                        probe_in_flight: true,
                    };
                    Ok(CallPermit::new(self, true))
                } else {
                    Err(MemoraiError::unavailable(&self.dependency, "circuit open"))
                }
            }
            State::HalfOpen { probe_in_flight } => {
                if probe_in_flight {
                    Err(MemoraiError::unavailable(
                        &self.dependency,
                        "circuit half-open, probe in flight",
                    ))
                } else {
                    inner.state = State::HalfOpen {
                        probe_in_flight: true,
                    };
                    Ok(CallPermit::new(self, true))
                }
            }
        }
    }

    fn record_success(&self, probe: bool) {
        let mut inner = self.lock();
        let recovered = !matches!(inner.state, State::Closed { .. });
        // Only the half-open probe may close a tripped circuit; a call that
        // started before the trip and succeeded late says nothing about now
        if recovered && !probe {
            debug!(dependency = %self.dependency, "Ignoring late success while circuit is not closed");
            return;
        }
        inner.state = State::Closed {
            failures: Vec::new(),
        };
        inner.consecutive_failures = 0;

        if recovered {
            info!(dependency = %self.dependency, "Circuit closed, dependency recovered");
        }
    }

    fn record_failure(&self) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let now = Instant::now();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.last_failure_at = Some(Utc::now());

        let threshold = self.config.failure_threshold;
        let window = self.config.failure_window;
        let trip = match &mut inner.state {
            State::Closed { failures } => {
                failures.push(now);
                failures.retain(|t| now.duration_since(*t) < window);
                failures.len() as u32 >= threshold
            }
            State::HalfOpen { .. } => {
                warn!(dependency = %self.dependency, "Half-open probe failed, circuit re-opened");
                true
            }
            State::Open { .. } => false,
        };

        if trip {
            if matches!(inner.state, State::Closed { .. }) {
                warn!(
                    dependency = %self.dependency,
                    failures = inner.consecutive_failures,
                    cooldown_secs = self.config.cooldown.as_secs_f64(),
                    "Circuit opened"
                );
            }
            inner.state = State::Open { opened_at: now };
        }
    }

    fn release_probe(&self) {
        let mut inner = self.lock();
        if let State::HalfOpen { probe_in_flight } = &mut inner.state {
            *probe_in_flight = false;
        }
    }

    /// Current state as seen by reports
    pub fn state(&self) -> BreakerState {
        match self.lock().state {
            State::Closed { .. } => BreakerState::Closed,
            State::Open { .. } => BreakerState::Open,
            State::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }

    /// Whether a call made now would be let through
    pub fn allows_calls(&self) -> bool {
        match self.lock().state {
            State::Closed { .. } => true,
            State::Open { opened_at } => opened_at.elapsed() >= self.config.cooldown,
            State::HalfOpen { probe_in_flight } => !probe_in_flight,
        }
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.lock();
        CircuitSnapshot {
            dependency: self.dependency.clone(),
            state: match inner.state {
                State::Closed { .. } => BreakerState::Closed,
                State::Open { .. } => BreakerState::Open,
                State::HalfOpen { .. } => BreakerState::HalfOpen,
            },
            consecutive_failures: inner.consecutive_failures,
            last_failure_at: inner.last_failure_at,
            failure_threshold: self.config.failure_threshold,
            cooldown_ms: self.config.cooldown.as_millis() as u64,
        }
    }

    /// Trip the circuit immediately
    pub fn force_open(&self) {
        let mut inner = self.lock();
        warn!(dependency = %self.dependency, "Circuit forced open");
        inner.state = State::Open {
            opened_at: Instant::now(),
        };
    }

    /// Close the circuit and forget all failures
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = State::Closed {
            failures: Vec::new(),
        };
        inner.consecutive_failures = 0;
        inner.last_failure_at = None;
    }
}

/// Permission to make one logical call.
///
/// Resolve with [`CallPermit::success`] or [`CallPermit::failure`]. A permit
/// dropped unresolved (cancelled call, non-transient error) changes no
/// counters and frees the half-open probe slot.
#[must_use = "a permit must be resolved with success() or failure()"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    resolved: bool,
}

impl<'a> CallPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, probe: bool) -> Self {
        Self {
            breaker,
            probe,
            resolved: false,
        }
    }

    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn success(mut self) {
        self.resolved = true;
        self.breaker.record_success(self.probe);
    }

    pub fn failure(mut self) {
        self.resolved = true;
        self.breaker.record_failure();
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.resolved && self.probe {
            self.breaker.release_probe();
        }
    }
}

/// Exponential backoff between attempts
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn from_config(config: &ResilienceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.backoff_multiplier.max(1.0),
        }
    }

    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Delay before retry number `attempt` (zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ResilienceConfig::default())
    }
}

/// Applies timeout, retry and breaker policy uniformly to every dependency
#[derive(Debug)]
pub struct ResilienceManager {
    breakers: HashMap<Dependency, CircuitBreaker>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl ResilienceManager {
    /// Create a manager with one breaker per dependency
    pub fn new(config: &ResilienceConfig, dependencies: impl IntoIterator<Item = Dependency>) -> Self {
        Self::with_policy(
            BreakerConfig::from_config(config),
            RetryPolicy::from_config(config),
            Duration::from_millis(config.call_timeout_ms),
            dependencies,
        )
    }

    pub fn with_policy(
        breaker: BreakerConfig,
        retry: RetryPolicy,
        call_timeout: Duration,
        dependencies: impl IntoIterator<Item = Dependency>,
    ) -> Self {
        let breakers = dependencies
            .into_iter()
            .map(|dep| (dep, CircuitBreaker::new(dep.to_string(), breaker)))
            .collect();
        Self {
            breakers,
            retry,
            call_timeout,
        }
    }

    pub fn breaker(&self, dependency: &Dependency) -> Option<&CircuitBreaker> {
        self.breakers.get(dependency)
    }

    /// Whether calls to `dependency` would currently be let through.
    /// Unknown dependencies are never blocked.
    pub fn allows_calls(&self, dependency: &Dependency) -> bool {
        self.breakers
            .get(dependency)
            .is_none_or(CircuitBreaker::allows_calls)
    }

    /// Whether the breaker for `dependency` is open
    pub fn is_open(&self, dependency: &Dependency) -> bool {
        self.breakers
            .get(dependency)
            .is_some_and(|b| b.state() == BreakerState::Open)
    }

    /// Snapshots of every breaker, ordered by tier then role
    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let mut deps: Vec<&Dependency> = self.breakers.keys().collect();
        deps.sort_by_key(|d| (d.tier.priority(), d.role.as_str()));
        deps.into_iter()
            .filter_map(|d| self.breakers.get(d))
            .map(CircuitBreaker::snapshot)
            .collect()
    }

    pub fn reset_all(&self) {
        for breaker in self.breakers.values() {
            breaker.reset();
        }
    }

    /// Run `operation` against `dependency` under the full policy.
    ///
    /// Each attempt is bounded by the call timeout; only transient errors are
    /// retried. The breaker sees one outcome for the whole logical call.
    /// Non-transient errors (validation, configuration) are returned as-is
    /// and do not count against the breaker.
    pub async fn call<T, F, Fut>(&self, dependency: Dependency, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let breaker = self.breakers.get(&dependency).ok_or_else(|| {
            MemoraiError::Configuration(format!("no circuit breaker registered for {dependency}"))
        })?;
        let permit = breaker.try_acquire()?;

        let mut attempt = 0;
        loop {
            let outcome = match tokio::time::timeout(self.call_timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(MemoraiError::unavailable(
                    dependency.to_string(),
                    format!("timed out after {}ms", self.call_timeout.as_millis()),
                )),
            };

            match outcome {
                Ok(value) => {
                    permit.success();
                    return Ok(value);
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt >= self.retry.max_retries || permit.is_probe() => {
                    warn!(
                        dependency = %dependency,
                        attempts = attempt + 1,
                        error = %e,
                        "Dependency call failed"
                    );
                    permit.failure();
                    return Err(match e {
                        MemoraiError::DependencyUnavailable { .. } => e,
                        other => MemoraiError::unavailable(dependency.to_string(), other.to_string()),
                    });
                }
                Err(e) => {
                    let delay = self.retry.delay_for(attempt);
                    debug!(
                        dependency = %dependency,
                        attempt = attempt + 1,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying dependency call"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn breaker(threshold: u32, cooldown: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            BreakerConfig {
                failure_threshold: threshold,
                failure_window: Duration::from_secs(60),
                cooldown,
            },
        )
    }

    #[test]
    fn test_new_breaker_is_closed() {
        let cb = breaker(3, Duration::from_secs(30));
        assert_eq!(cb.state(), BreakerState::Closed);
        assert!(cb.allows_calls());
    }

    #[test]
    fn test_threshold_failures_open_circuit() {
        let cb = breaker(3, Duration::from_secs(30));
        for _ in 0..3 {
            cb.try_acquire().unwrap().failure();
        }
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(cb.try_acquire().is_err());
        assert_eq!(cb.snapshot().consecutive_failures, 3);
    }

    #[test]
    fn test_success_resets_failures() {
        let cb = breaker(3, Duration::from_secs(30));
        cb.try_acquire().unwrap().failure();
        cb.try_acquire().unwrap().failure();
        cb.try_acquire().unwrap().success();
        cb.try_acquire().unwrap().failure();
        assert_eq!(cb.state(), BreakerState::Closed);
        assert_eq!(cb.snapshot().consecutive_failures, 1);
    }

    #[test]
    fn test_old_failures_fall_out_of_window() {
        let cb = breaker(2, Duration::from_secs(30));
        {
            let mut inner = cb.inner.lock().unwrap();
            inner.state = State::Closed {
                failures: vec![Instant::now() - Duration::from_secs(120)],
            };
        }
        cb.try_acquire().unwrap().failure();
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[test]
    fn test_open_circuit_allows_single_probe_after_cooldown() {
        let cb = breaker(1, Duration::from_secs(30));
        {
            let mut inner = cb.inner.lock().unwrap();
            inner.state = State::Open {
                opened_at: Instant::now() - Duration::from_secs(31),
            };
        }

        let probe = cb.try_acquire().expect("probe should be allowed");
        assert!(probe.is_probe());
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        assert!(cb.try_acquire().is_err(), "second caller must be rejected");

        probe.success();
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cb = breaker(5, Duration::from_secs(30));
        {
            let mut inner = cb.inner.lock().unwrap();
            inner.state = State::HalfOpen {
                probe_in_flight: false,
            };
        }
        cb.try_acquire().unwrap().failure();
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(cb.try_acquire().is_err());
    }

    #[test]
    fn test_late_success_does_not_close_tripped_circuit() {
        let cb = breaker(1, Duration::from_secs(30));
        let slow = cb.try_acquire().unwrap();
        cb.try_acquire().unwrap().failure();
        assert_eq!(cb.state(), BreakerState::Open);

        slow.success();
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(!cb.allows_calls());
        assert_eq!(cb.snapshot().consecutive_failures, 1);
    }

    #[test]
    fn test_dropped_probe_frees_slot() {
        let cb = breaker(1, Duration::ZERO);
        cb.force_open();

        let probe = cb.try_acquire().unwrap();
        drop(probe);

        assert_eq!(cb.state(), BreakerState::HalfOpen);
        assert_eq!(cb.snapshot().consecutive_failures, 0);
        assert!(cb.try_acquire().is_ok());
    }

    #[test]
    fn test_reset() {
        let cb = breaker(1, Duration::from_secs(30));
        cb.try_acquire().unwrap().failure();
        assert_eq!(cb.state(), BreakerState::Open);
        cb.reset();
        assert_eq!(cb.state(), BreakerState::Closed);
        assert!(cb.snapshot().last_failure_at.is_none());
    }

    #[test]
    fn test_retry_policy_backoff() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
            multiplier: 2.0,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(350));
    }

    #[test]
    fn test_dependency_display() {
        let dep = Dependency::embedding(TierKind::SemanticRemote);
        assert_eq!(dep.to_string(), "semantic-remote/embedding");
        let dep = Dependency::vector_store(TierKind::SemanticLocal);
        assert_eq!(dep.to_string(), "semantic-local/vector-store");
    }

    fn manager(threshold: u32, retries: u32) -> ResilienceManager {
        ResilienceManager::with_policy(
            BreakerConfig {
                failure_threshold: threshold,
                failure_window: Duration::from_secs(60),
                cooldown: Duration::from_secs(60),
            },
            RetryPolicy {
                max_retries: retries,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(5),
                multiplier: 2.0,
            },
            Duration::from_millis(200),
            [Dependency::embedding(TierKind::SemanticRemote)],
        )
    }

    #[tokio::test]
    async fn test_call_retries_transient_errors() {
        let manager = manager(5, 2);
        let dep = Dependency::embedding(TierKind::SemanticRemote);
        let calls = AtomicU32::new(0);

        let result = manager
            .call(dep, || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(MemoraiError::Embedding("flaky".into()))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(manager.breaker(&dep).unwrap().snapshot().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_call_counts_one_failure_per_logical_call() {
        let manager = manager(5, 2);
        let dep = Dependency::embedding(TierKind::SemanticRemote);
        let calls = AtomicU32::new(0);

        let result: Result<()> = manager
            .call(dep, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(MemoraiError::Embedding("down".into()))
            })
            .await;

        assert!(matches!(result, Err(MemoraiError::DependencyUnavailable { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(manager.breaker(&dep).unwrap().snapshot().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_validation_errors_are_not_retried_or_counted() {
        let manager = manager(1, 3);
        let dep = Dependency::embedding(TierKind::SemanticRemote);
        let calls = AtomicU32::new(0);

        let result: Result<()> = manager
            .call(dep, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(MemoraiError::Validation("bad".into()))
            })
            .await;

        assert!(matches!(result, Err(MemoraiError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.breaker(&dep).unwrap().state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_timeout_is_a_failure() {
        let manager = manager(1, 0);
        let dep = Dependency::embedding(TierKind::SemanticRemote);

        let result: Result<()> = manager
            .call(dep, || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(MemoraiError::DependencyUnavailable { .. })));
        assert!(manager.is_open(&dep));
    }

    #[tokio::test]
    async fn test_open_circuit_short_circuits() {
        let manager = manager(1, 0);
        let dep = Dependency::embedding(TierKind::SemanticRemote);
        manager.breaker(&dep).unwrap().force_open();

        let calls = AtomicU32::new(0);
        let result: Result<()> = manager
            .call(dep, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!manager.allows_calls(&dep));
    }

    #[tokio::test]
    async fn test_unknown_dependency_is_configuration_error() {
        let manager = manager(1, 0);
        let result: Result<()> = manager
            .call(Dependency::embedding(TierKind::SemanticLocal), || async { Ok(()) })
            .await;
        assert!(matches!(result, Err(MemoraiError::Configuration(_))));
    }
}
