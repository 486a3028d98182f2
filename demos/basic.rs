use std::time::Duration;

use sluice::RateLimiter;

fn main() {
    // burst of 20 permits, refilled at 10 per second
    let limiter = RateLimiter::new(20, 10, Duration::from_secs(1)).unwrap();

    // the initial burst is available immediately
    assert!(limiter.add_n(20));
    assert!(!limiter.add());

    // half a second later roughly 5 permits have come back
    std::thread::sleep(Duration::from_millis(550));
    assert!(limiter.add_n(5));
}
