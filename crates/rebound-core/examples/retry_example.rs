//! Example: Running operations through a RetryTemplate
//!
//! This example demonstrates:
//! 1. Retrying with exponential back-off
//! 2. Classifying failures (only retry network errors)
//! 3. Falling back to a recovery callback
//! 4. Observing executions with listeners
//!
//! Run with:
//! ```bash
//! RUST_LOG=rebound_core=debug cargo run -p rebound-core --example retry_example
//! ```

use rebound_core::prelude::*;
use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// A simulated API that fails the first few times
struct UnreliableApi {
    attempts: AtomicU32,
    fail_count: u32,
}

impl UnreliableApi {
    fn new(fail_count: u32) -> Self {
        Self {
            attempts: AtomicU32::new(0),
            fail_count,
        }
    }

    async fn call(&self) -> Result<String, std::io::Error> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        if attempt <= self.fail_count {
            println!("  Attempt {}: FAILED (network timeout)", attempt);
            Err(std::io::Error::other(format!("network timeout on attempt {}", attempt)))
        } else {
            println!("  Attempt {}: SUCCESS", attempt);
            Ok("API response data".to_string())
        }
    }

    fn total_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

/// Example 1: Exponential back-off between attempts
async fn example_exponential_back_off() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 1: Exponential Back-off ===\n");

    let template = RetryTemplate::builder()
        .name("fetch-data")
        .max_attempts(4)
        .back_off_policy(
            ExponentialBackOffPolicy::builder()
                .initial_delay(Duration::from_millis(100))
                .multiplier(2.0)
                .jitter(0.0)
                .build(),
        )
        .build();

    let api = UnreliableApi::new(2);
    println!("Calling unreliable API (will fail 2 times before succeeding)...");
    let start = Instant::now();

    let result = template.execute(|_ctx| api.call()).await?;

    println!("\nResult: {}", result);
    println!("Total attempts: {}", api.total_attempts());
    println!("Total time: {:?}", start.elapsed());
    println!("Expected pauses: 100ms + 200ms = ~300ms");

    Ok(())
}

/// Example 2: Only network errors are retried
async fn example_classifier() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 2: Retry Network Errors Only ===\n");

    let template = RetryTemplate::builder()
        .retry_policy(
            SimpleRetryPolicy::new(3)
                .retry_if(|err| err.to_string().to_lowercase().contains("network")),
        )
        .build();

    println!("Test 1: Auth error (should NOT retry)");
    let attempts = AtomicU32::new(0);
    let result = template
        .execute(|_ctx| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), _>(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "auth failed",
                ))
            }
        })
        .await;
    assert!(result.is_err());
    println!("  Attempts: {}", attempts.load(Ordering::SeqCst));

    println!("\nTest 2: Network error (should retry)");
    let api = UnreliableApi::new(2);
    template.execute(|_ctx| api.call()).await?;
    println!("  Attempts: {}", api.total_attempts());

    Ok(())
}

/// Example 3: Serving a cached value once retries are exhausted
async fn example_recovery() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 3: Recovery Callback ===\n");

    let template = RetryTemplate::builder().max_attempts(2).build();
    let api = UnreliableApi::new(u32::MAX);

    let result = template
        .execute_with_recovery(
            |_ctx| api.call(),
            |ctx: &RetryContext| {
                println!(
                    "  Recovering after {} attempts (last error: {})",
                    ctx.attempt_count(),
                    ctx.last_failure().map(|e| e.to_string()).unwrap_or_default()
                );
                Ok("cached response".to_string())
            },
        )
        .await?;

    println!("\nResult: {}", result);

    Ok(())
}

/// Example 4: Listeners observe every execution
async fn example_listeners() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 4: Listeners ===\n");

    let stats = Arc::new(StatisticsListener::new());
    let template = RetryTemplate::builder()
        .name("inventory")
        .max_attempts(3)
        .listener(TracingListener)
        .listener(Arc::clone(&stats))
        .build();

    for fail_count in [0, 1, 5] {
        let api = UnreliableApi::new(fail_count);
        let _ = template.execute(|_ctx| api.call()).await;
    }

    println!("\nStatistics:");
    println!("{}", serde_json::to_string_pretty(&stats.snapshot())?);

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("==============================================");
    println!("   Rebound Core: Retry Template Examples");
    println!("==============================================");

    example_exponential_back_off().await?;
    example_classifier().await?;
    example_recovery().await?;
    example_listeners().await?;

    println!("\n==============================================");
    println!("   All examples completed successfully!");
    println!("==============================================\n");

    Ok(())
}
