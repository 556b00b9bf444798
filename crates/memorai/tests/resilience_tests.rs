//! Integration tests for the resilience layer
//!
//! Drives `ResilienceManager::call` with simulated dependencies to check the
//! breaker lifecycle as callers observe it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use memorai::engine::TierKind;
use memorai::error::MemoraiError;
use memorai::resilience::{BreakerConfig, BreakerState, Dependency, ResilienceManager, RetryPolicy};
use tokio::sync::oneshot;

fn dep() -> Dependency {
    Dependency::embedding(TierKind::SemanticRemote)
}

fn manager(threshold: u32, cooldown: Duration) -> Arc<ResilienceManager> {
    Arc::new(ResilienceManager::with_policy(
        BreakerConfig {
            failure_threshold: threshold,
            failure_window: Duration::from_secs(60),
            cooldown,
        },
        RetryPolicy::none(),
        Duration::from_secs(5),
        [dep(), Dependency::vector_store(TierKind::SemanticRemote)],
    ))
}

async fn failing_call(manager: &ResilienceManager, calls: &AtomicU32) -> Result<(), MemoraiError> {
    manager
        .call(dep(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(MemoraiError::Embedding("boom".to_string()))
        })
        .await
}

async fn working_call(manager: &ResilienceManager, calls: &AtomicU32) -> Result<u32, MemoraiError> {
    manager
        .call(dep(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        })
        .await
}

#[tokio::test]
async fn test_breaker_lifecycle() {
    let manager = manager(3, Duration::from_millis(50));
    let calls = AtomicU32::new(0);

    for _ in 0..3 {
        let err = failing_call(&manager, &calls).await.unwrap_err();
        assert!(matches!(err, MemoraiError::DependencyUnavailable { .. }));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(manager.is_open(&dep()));

    // Short-circuits without touching the dependency
    assert!(working_call(&manager, &calls).await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(!manager.allows_calls(&dep()));

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(manager.allows_calls(&dep()));

    // The probe reaches the dependency and closes the circuit
    assert_eq!(working_call(&manager, &calls).await.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(manager.breaker(&dep()).unwrap().state(), BreakerState::Closed);
}

#[tokio::test]
async fn test_failed_probe_reopens_for_another_cooldown() {
    let manager = manager(1, Duration::from_millis(40));
    let calls = AtomicU32::new(0);

    failing_call(&manager, &calls).await.unwrap_err();
    tokio::time::sleep(Duration::from_millis(60)).await;

    failing_call(&manager, &calls).await.unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(manager.is_open(&dep()));

    // Rejected again until the new cooldown passes
    failing_call(&manager, &calls).await.unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_only_one_probe_in_flight() {
    let manager = manager(1, Duration::from_millis(20));
    let calls = Arc::new(AtomicU32::new(0));

    failing_call(&manager, &calls).await.unwrap_err();
    tokio::time::sleep(Duration::from_millis(40)).await;

    let (release, gate) = oneshot::channel::<()>();
    let probe = {
        let manager = Arc::clone(&manager);
        let calls = Arc::clone(&calls);
        tokio::spawn(async move {
            let mut gate = Some(gate);
            manager
                .call(dep(), || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let gate = gate.take();
                    async move {
                        if let Some(gate) = gate {
                            let _ = gate.await;
                        }
                        Ok(())
                    }
                })
                .await
        })
    };

    // Wait until the probe is parked inside the dependency
    while calls.load(Ordering::SeqCst) < 2 {
        tokio::task::yield_now().await;
    }
    assert_eq!(manager.breaker(&dep()).unwrap().state(), BreakerState::HalfOpen);
    assert!(working_call(&manager, &calls).await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    release.send(()).unwrap();
    probe.await.unwrap().unwrap();
    assert_eq!(working_call(&manager, &calls).await.unwrap(), 7);
}

#[tokio::test]
async fn test_concurrent_failures_open_once() {
    let manager = manager(5, Duration::from_secs(60));
    let calls = Arc::new(AtomicU32::new(0));

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move { failing_call(&manager, &calls).await })
        })
        .collect();
    for result in futures::future::join_all(tasks).await {
        assert!(result.unwrap().is_err());
    }

    let snapshot = manager.breaker(&dep()).unwrap().snapshot();
    assert_eq!(snapshot.state, BreakerState::Open);
    assert!(snapshot.consecutive_failures >= 5);
    assert!(calls.load(Ordering::SeqCst) >= 5);
}

#[tokio::test]
async fn test_breakers_are_independent_per_dependency() {
    let manager = manager(1, Duration::from_secs(60));
    let calls = AtomicU32::new(0);
    failing_call(&manager, &calls).await.unwrap_err();

    let vectors = Dependency::vector_store(TierKind::SemanticRemote);
    assert!(manager.is_open(&dep()));
    assert!(!manager.is_open(&vectors));
    let result = manager.call(vectors, || async { Ok::<_, MemoraiError>(1) }).await;
    assert_eq!(result.unwrap(), 1);

    let snapshots = manager.snapshots();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].dependency, "semantic-remote/embedding");

    manager.reset_all();
    assert!(!manager.is_open(&dep()));
}

#[tokio::test]
async fn test_retries_back_off_then_succeed() {
    let manager = ResilienceManager::with_policy(
        BreakerConfig {
            failure_threshold: 1,
            failure_window: Duration::from_secs(60),
            cooldown: Duration::from_secs(60),
        },
        RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            multiplier: 2.0,
        },
        Duration::from_secs(5),
        [dep()],
    );
    let attempts = AtomicU32::new(0);

    let result = manager
        .call(dep(), || async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 3 {
                Err(MemoraiError::unavailable("embedding", "flaky"))
            } else {
                Ok("done")
            }
        })
        .await;

    assert_eq!(result.unwrap(), "done");
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
    // Transient failures that were retried away never trip the breaker
    assert_eq!(manager.breaker(&dep()).unwrap().state(), BreakerState::Closed);
}
