//! Integration tests for the retry engine lifecycle

use proptest::prelude::*;
use rebound_core::prelude::*;
use std::error::Error;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every hook invocation as `"<label>.<hook>"`.
struct RecordingListener {
    label: &'static str,
    allow: bool,
    log: Arc<Mutex<Vec<String>>>,
    closed_with: Arc<Mutex<Vec<Option<String>>>>,
}

impl RecordingListener {
    fn new(label: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            label,
            allow: true,
            log: Arc::clone(log),
            closed_with: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn vetoing(mut self) -> Self {
        self.allow = false;
        self
    }
}

impl RetryListener for RecordingListener {
    fn open(&self, _context: &RetryContext) -> bool {
        self.log.lock().unwrap().push(format!("{}.open", self.label));
        self.allow
    }

    fn on_error(&self, _context: &RetryContext, _error: &(dyn Error + Send + Sync + 'static)) {
        self.log.lock().unwrap().push(format!("{}.on_error", self.label));
    }

    fn close(&self, _context: &RetryContext, error: Option<&(dyn Error + Send + Sync + 'static)>) {
        self.log.lock().unwrap().push(format!("{}.close", self.label));
        self.closed_with
            .lock()
            .unwrap()
            .push(error.map(ToString::to_string));
    }
}

fn count(log: &Arc<Mutex<Vec<String>>>, entry: &str) -> usize {
    log.lock().unwrap().iter().filter(|e| *e == entry).count()
}

#[tokio::test]
async fn test_always_failing_operation_raises_last_error() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let listener = Arc::new(RecordingListener::new("L", &log));
    let template = RetryTemplate::builder()
        .max_attempts(3)
        .back_off_policy(NoBackOffPolicy)
        .listener(Arc::clone(&listener))
        .build();
    let attempts_seen = Arc::new(AtomicU32::new(0));

    let result = template
        .execute(|ctx| {
            let attempts_seen = Arc::clone(&attempts_seen);
            async move {
                attempts_seen.store(ctx.attempt_count(), Ordering::SeqCst);
                Err::<(), _>(io::Error::other(format!("E{}", ctx.attempt_count())))
            }
        })
        .await;

    match result {
        Err(RetryError::Exhausted(err)) => assert_eq!(err.to_string(), "E3"),
        other => panic!("Expected Exhausted, got {:?}", other),
    }
    assert_eq!(attempts_seen.load(Ordering::SeqCst), 3);
    assert_eq!(count(&log, "L.on_error"), 3);
    assert_eq!(count(&log, "L.close"), 1);
    assert_eq!(
        *listener.closed_with.lock().unwrap(),
        vec![Some("E3".to_string())]
    );
}

#[tokio::test]
async fn test_fails_twice_then_ok() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let listener = Arc::new(RecordingListener::new("L", &log));
    let template = RetryTemplate::builder()
        .max_attempts(3)
        .listener(Arc::clone(&listener))
        .build();

    let result = template
        .execute(|ctx| async move {
            if ctx.attempt_count() < 3 {
                Err(io::Error::other("E"))
            } else {
                Ok(("ok", ctx.attempt_count()))
            }
        })
        .await;

    assert_eq!(result.unwrap(), ("ok", 3));
    assert_eq!(count(&log, "L.on_error"), 2);
    assert_eq!(*listener.closed_with.lock().unwrap(), vec![None]);
}

#[tokio::test]
async fn test_recovery_runs_after_close_with_last_failure() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let template = RetryTemplate::builder()
        .max_attempts(3)
        .listener(RecordingListener::new("L", &log))
        .build();
    let recovery_log = Arc::clone(&log);

    let result = template
        .execute_with_recovery(
            |ctx| async move { Err::<String, _>(io::Error::other(format!("E{}", ctx.attempt_count()))) },
            move |ctx: &RetryContext| {
                recovery_log.lock().unwrap().push("recover".to_string());
                let last = ctx.last_failure().map(|e| e.to_string()).unwrap_or_default();
                Ok(format!("recovered from {}", last))
            },
        )
        .await;

    assert_eq!(result.unwrap(), "recovered from E3");
    let log = log.lock().unwrap();
    assert_eq!(log[log.len() - 2..], ["L.close".to_string(), "recover".to_string()]);
}

#[tokio::test]
async fn test_listeners_nest_symmetrically() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let template = RetryTemplate::builder()
        .max_attempts(2)
        .listener(RecordingListener::new("L1", &log))
        .listener(RecordingListener::new("L2", &log))
        .build();

    let _ = template
        .execute(|_ctx| async { Err::<(), _>(io::Error::other("E")) })
        .await;

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "L1.open",
            "L2.open",
            "L2.on_error",
            "L1.on_error",
            "L2.on_error",
            "L1.on_error",
            "L2.close",
            "L1.close",
        ]
    );
}

#[tokio::test]
async fn test_veto_skips_operation_but_closes_opened_listeners() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let template = RetryTemplate::builder()
        .listener(RecordingListener::new("L1", &log))
        .listener(RecordingListener::new("L2", &log).vetoing())
        .listener(RecordingListener::new("L3", &log))
        .build();
    let invocations = AtomicU32::new(0);

    let result = template
        .execute(|_ctx| {
            invocations.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, io::Error>(()) }
        })
        .await;

    assert!(result.unwrap_err().is_vetoed());
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
    assert_eq!(*log.lock().unwrap(), vec!["L1.open", "L2.open", "L1.close"]);
}

#[tokio::test]
async fn test_veto_ignores_recovery() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let template = RetryTemplate::builder()
        .listener(RecordingListener::new("L1", &log).vetoing())
        .build();

    let result = template
        .execute_with_recovery(
            |_ctx| async { Ok::<_, io::Error>(1) },
            |_ctx: &RetryContext| Ok(2),
        )
        .await;

    assert!(result.unwrap_err().is_vetoed());
}

#[tokio::test]
async fn test_nested_executions_keep_independent_counters() {
    let outer = RetryTemplate::builder().name("outer").max_attempts(3).build();
    let inner = RetryTemplate::builder().name("inner").max_attempts(5).build();
    let inner_counts = Arc::new(Mutex::new(Vec::new()));

    let result = outer
        .execute(|outer_ctx| {
            let inner = inner.clone();
            let inner_counts = Arc::clone(&inner_counts);
            async move {
                let nested = inner
                    .execute(|inner_ctx| {
                        let outer_ctx = outer_ctx.clone();
                        let inner_counts = Arc::clone(&inner_counts);
                        async move {
                            let parent = inner_ctx.parent().expect("nested context has a parent");
                            assert_eq!(parent.name(), Some("outer"));
                            assert_eq!(parent.attempt_count(), outer_ctx.attempt_count());
                            inner_counts.lock().unwrap().push(inner_ctx.attempt_count());
                            if inner_ctx.attempt_count() < 4 {
                                Err(io::Error::other("inner"))
                            } else {
                                Ok(inner_ctx.attempt_count())
                            }
                        }
                    })
                    .await
                    .map_err(|e| io::Error::other(e.to_string()))?;

                if outer_ctx.attempt_count() < 2 {
                    Err(io::Error::other("outer"))
                } else {
                    Ok((outer_ctx.attempt_count(), nested))
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), (2, 4));
    assert_eq!(*inner_counts.lock().unwrap(), vec![1, 2, 3, 4, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_top_level_context_has_no_parent() {
    let template = RetryTemplate::default();

    let has_parent = template
        .execute(|ctx| async move { Ok::<_, io::Error>(ctx.parent().is_some()) })
        .await
        .unwrap();

    assert!(!has_parent);
    assert!(RetryContext::current().is_none());
}

#[tokio::test]
async fn test_policy_classifier_stops_on_permanent_error() {
    let template = RetryTemplate::builder()
        .retry_policy(
            SimpleRetryPolicy::new(5).retry_if(|err| err.to_string().contains("network")),
        )
        .build();
    let attempts = AtomicU32::new(0);

    let result = template
        .execute(|_ctx| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(io::Error::other("auth failed")) }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_statistics_listener_counts_outcomes() {
    let stats = Arc::new(StatisticsListener::new());
    let template = RetryTemplate::builder()
        .name("stats")
        .max_attempts(2)
        .listener(Arc::clone(&stats))
        .build();

    let _ = template
        .execute(|_ctx| async { Err::<(), _>(io::Error::other("E")) })
        .await;
    let _ = template
        .execute(|_ctx| async { Ok::<_, io::Error>(()) })
        .await;

    assert_eq!(
        stats.statistics("stats"),
        Some(RetryStatistics {
            started: 2,
            completed: 1,
            errors: 2,
            aborted: 1,
        })
    );
}

#[tokio::test]
async fn test_vetoed_execution_counts_as_aborted() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let stats = Arc::new(StatisticsListener::new());
    let template = RetryTemplate::builder()
        .name("gated")
        .listener(Arc::clone(&stats))
        .listener(RecordingListener::new("gate", &log).vetoing())
        .build();

    let result = template
        .execute(|_ctx| async { Ok::<_, io::Error>(()) })
        .await;

    assert!(result.unwrap_err().is_vetoed());
    assert_eq!(
        stats.statistics("gated"),
        Some(RetryStatistics {
            started: 1,
            completed: 0,
            errors: 0,
            aborted: 1,
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_back_off() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let listener = Arc::new(RecordingListener::new("L", &log));
    let template = RetryTemplate::builder()
        .max_attempts(5)
        .back_off_policy(FixedBackOffPolicy::new(Duration::from_secs(10)))
        .listener(Arc::clone(&listener))
        .build();
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let result = template
        .execute_cancellable(
            |_ctx| async { Err::<(), _>(io::Error::other("E")) },
            None,
            &token,
        )
        .await;

    match result {
        Err(RetryError::Cancelled { attempts }) => assert_eq!(attempts, 1),
        other => panic!("Expected Cancelled, got {:?}", other),
    }
    assert_eq!(count(&log, "L.close"), 1);
    assert_eq!(
        *listener.closed_with.lock().unwrap(),
        vec![Some("E".to_string())]
    );
}

#[tokio::test]
async fn test_cancelled_before_first_attempt() {
    let template = RetryTemplate::default();
    let token = CancellationToken::new();
    token.cancel();
    let invocations = AtomicU32::new(0);
    let recovery = |_ctx: &RetryContext| Ok::<i32, io::Error>(0);

    let result = template
        .execute_cancellable(
            |_ctx| {
                invocations.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, io::Error>(1) }
            },
            Some(&recovery as &dyn RecoveryCallback<i32, io::Error>),
            &token,
        )
        .await;

    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_uncancelled_token_lets_retries_finish() {
    let template = RetryTemplate::builder()
        .max_attempts(3)
        .back_off_policy(FixedBackOffPolicy::new(Duration::from_millis(100)))
        .build();
    let token = CancellationToken::new();

    let result = template
        .execute_cancellable(
            |ctx| async move {
                if ctx.attempt_count() < 3 {
                    Err(io::Error::other("E"))
                } else {
                    Ok("done")
                }
            },
            None,
            &token,
        )
        .await;

    assert_eq!(result.unwrap(), "done");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shared_template_across_tasks() {
    let template = Arc::new(RetryTemplate::builder().max_attempts(4).build());

    let handles: Vec<_> = (0..8u32)
        .map(|i| {
            let template = Arc::clone(&template);
            tokio::spawn(async move {
                template
                    .execute(move |ctx| async move {
                        if ctx.attempt_count() <= i % 3 {
                            Err(io::Error::other("busy"))
                        } else {
                            Ok(ctx.attempt_count())
                        }
                    })
                    .await
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let attempts = handle.await.unwrap().unwrap();
        assert_eq!(attempts, (i as u32 % 3) + 1);
    }
}

proptest! {
    #[test]
    fn prop_succeeds_on_attempt_n(n in 1u32..12, slack in 0u32..4) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let template = RetryTemplate::builder().max_attempts(n + slack).build();

        let (value, attempts) = runtime.block_on(async {
            template
                .execute(move |ctx| async move {
                    if ctx.attempt_count() < n {
                        Err(io::Error::other("not yet"))
                    } else {
                        Ok(("ok", ctx.attempt_count()))
                    }
                })
                .await
        }).unwrap();

        prop_assert_eq!(value, "ok");
        prop_assert_eq!(attempts, n);
    }
}
