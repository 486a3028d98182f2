use std::sync::Arc;
use std::time::Duration;

use sluice::{CancellationToken, RateLimiter, TokioClock};

#[tokio::main]
async fn main() {
    // one permit every 100ms, burst of 5
    let limiter = Arc::new(
        RateLimiter::with_clock(5, 10, Duration::from_secs(1), TokioClock::default()).unwrap(),
    );

    // drain the burst so the waiters actually wait
    assert!(limiter.add_n(5));

    let cancel = CancellationToken::new();
    let mut tasks = vec![];
    for id in 0..3 {
        let limiter = Arc::clone(&limiter);
        let cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            limiter.wait(&cancel).await.unwrap();
            println!("waiter {id} admitted");
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // drain anything that trickled back in, then ask for more than a short
    // deadline allows
    while limiter.add() {}
    let deadline = tokio::time::Instant::now() + Duration::from_millis(10);
    let err = limiter.wait_n_until(5, deadline).await.unwrap_err();
    println!("short deadline: {err}");
}
