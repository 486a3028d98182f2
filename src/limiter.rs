use std::sync::Mutex;
use std::time::Duration;

use crate::bucket::Bucket;
use crate::clock::Clock;
use crate::error::InvalidRate;
use crate::StdClock;

/// A token-bucket rate limiter driven lazily by wall-clock time.
///
/// The limiter owns a [`Bucket`] of permits together with the timestamp of
/// its last top-up. Permits flow back into the bucket at one permit per
/// *refill interval*, computed at construction as `per / rate`; the refill is
/// reconciled lazily on every access rather than by a background timer, so an
/// idle limiter costs nothing.
///
/// The non-blocking [`add`](Self::add) / [`add_n`](Self::add_n) calls answer
/// "may this request proceed right now?". The async [`wait`](Self::wait) /
/// [`wait_n`](Self::wait_n) calls (behind the `async` feature) park the
/// caller on a ticker until permits free up, racing against a cancellation
/// token or deadline.
///
/// All state sits behind one mutex, so the refill computation and the
/// subsequent take are a single atomic unit; two callers can never
/// double-credit the bucket from the same elapsed window. The lock is never
/// held across an await point. There is no fairness guarantee between
/// concurrent waiters: whichever waiter's tick first observes a refilled
/// permit wins.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use sluice::RateLimiter;
///
/// // burst of 100 permits, refilled at 10 per second
/// let limiter = RateLimiter::new(100, 10, Duration::from_secs(1)).unwrap();
/// assert!(limiter.add());
/// ```
pub struct RateLimiter<C = StdClock> {
    state: Mutex<State>,
    /// Time that must elapse for one new permit to become available.
    refill_every: Duration,
    clock: C,
}

struct State {
    bucket: Bucket,
    /// Clock reading (seconds) at which permits were last added.
    ///
    /// Left untouched when an access credits nothing, so sub-interval elapsed
    /// time keeps accumulating instead of resetting on every call.
    last_refill: f64,
}

impl RateLimiter<StdClock> {
    /// Creates a rate limiter holding at most `max_tokens` permits, refilled
    /// at `rate` permits per `per`, measured against the real clock.
    ///
    /// The bucket starts full, so the first `max_tokens` requests are
    /// admitted immediately; after that, one permit becomes available every
    /// `per / rate`. A limiter configured with 100 max tokens and a rate of
    /// 10 per minute refills one permit every 6 seconds while allowing a
    /// burst of 100.
    ///
    /// Fails with [`InvalidRate`] when `rate` is zero.
    pub fn new(max_tokens: u64, rate: u64, per: Duration) -> Result<Self, InvalidRate> {
        Self::with_clock(max_tokens, rate, per, StdClock::default())
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Creates a rate limiter with a custom time source.
    ///
    /// Use this to drive the refill math from tokio's (pausable) time with
    /// [`TokioClock`](crate::TokioClock), or from a
    /// [`ManualClock`](crate::ManualClock) in deterministic tests. The
    /// initial refill timestamp is read from the supplied clock.
    ///
    /// Fails with [`InvalidRate`] when `rate` is zero.
    pub fn with_clock(
        max_tokens: u64,
        rate: u64,
        per: Duration,
        clock: C,
    ) -> Result<Self, InvalidRate> {
        if rate == 0 {
            return Err(InvalidRate);
        }
        let refill_every = per.div_f64(rate as f64);
        let last_refill = clock.now();
        Ok(Self {
            state: Mutex::new(State {
                bucket: Bucket::new(max_tokens),
                last_refill,
            }),
            refill_every,
            clock,
        })
    }

    /// Attempts to take a single permit without blocking.
    ///
    /// Returns `false` when the rate limit has been reached; that is a
    /// normal "try again later" outcome, not an error.
    pub fn add(&self) -> bool {
        self.add_n(1)
    }

    /// Attempts to take `n` permits without blocking, all or nothing.
    ///
    /// Elapsed time is reconciled into fresh permits first, then the take is
    /// attempted under the same lock.
    pub fn add_n(&self, n: u64) -> bool {
        let mut state = self.state.lock().unwrap();
        self.refill(&mut state);
        state.bucket.take_n(n)
    }

    /// Permits currently available, after reconciling elapsed time.
    pub fn available(&self) -> u64 {
        let mut state = self.state.lock().unwrap();
        self.refill(&mut state);
        state.bucket.available()
    }

    /// The most permits the limiter can ever hold (the burst ceiling).
    pub fn capacity(&self) -> u64 {
        self.state.lock().unwrap().bucket.capacity()
    }

    /// The duration that must elapse for one new permit to become available.
    pub fn refill_interval(&self) -> Duration {
        self.refill_every
    }

    /// Converts the time elapsed since the last top-up into new permits.
    ///
    /// The number of earned permits is `elapsed / refill_interval` rounded to
    /// nearest, which tracks the configured rate more closely over many
    /// sub-interval calls than truncation would. When nothing is credited the
    /// refill timestamp is deliberately not advanced.
    fn refill(&self, state: &mut State) {
        let now = self.clock.now();
        let elapsed = now - state.last_refill;
        if elapsed <= 0.0 {
            return;
        }
        // A degenerate zero interval divides to infinity, which the
        // saturating cast and the bucket clamp turn into "fill to capacity".
        let refills = (elapsed / self.refill_every.as_secs_f64()).round();
        if refills > 0.0 {
            state.bucket.refill(refills as u64);
            state.last_refill = now;
        }
    }
}

#[cfg(feature = "async")]
mod wait {
    use std::time::Duration;

    use likely_stable::unlikely;
    use tokio::time::{Instant, MissedTickBehavior};
    use tokio_util::sync::CancellationToken;

    use super::RateLimiter;
    use crate::error::WaitError;
    use crate::Clock;

    impl<C: Clock> RateLimiter<C> {
        /// Blocks until a single permit is available or `cancel` fires.
        ///
        /// Consumes the permit on success. See [`wait_n`](Self::wait_n).
        pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), WaitError> {
            self.wait_n(1, cancel).await
        }

        /// Blocks until `n` permits are available or `cancel` fires.
        ///
        /// Retries the non-blocking take once per refill interval, parking
        /// between attempts; it never busy-spins. Consumes the permits on
        /// success.
        ///
        /// Fails immediately with [`WaitError::ExceedsCapacity`] when `n` is
        /// larger than the bucket can ever hold, and with
        /// [`WaitError::Cancelled`] when the token fires first.
        ///
        /// # Examples
        ///
        /// ```rust
        /// use std::time::Duration;
        ///
        /// use sluice::{CancellationToken, RateLimiter};
        ///
        /// # async fn example() -> Result<(), sluice::WaitError> {
        /// let limiter = RateLimiter::new(100, 10, Duration::from_secs(1)).unwrap();
        /// let cancel = CancellationToken::new();
        /// limiter.wait_n(20, &cancel).await?;
        /// # Ok(())
        /// # }
        /// ```
        pub async fn wait_n(&self, n: u64, cancel: &CancellationToken) -> Result<(), WaitError> {
            tokio::select! {
                res = self.acquire(n) => res,
                _ = cancel.cancelled() => Err(WaitError::Cancelled),
            }
        }

        /// Blocks until a single permit is available or `deadline` passes.
        ///
        /// Consumes the permit on success. See
        /// [`wait_n_until`](Self::wait_n_until).
        pub async fn wait_until(&self, deadline: Instant) -> Result<(), WaitError> {
            self.wait_n_until(1, deadline).await
        }

        /// Blocks until `n` permits are available or `deadline` passes.
        ///
        /// The deadline-bounded twin of [`wait_n`](Self::wait_n); a deadline
        /// that fires first surfaces as [`WaitError::DeadlineExceeded`].
        pub async fn wait_n_until(&self, n: u64, deadline: Instant) -> Result<(), WaitError> {
            match tokio::time::timeout_at(deadline, self.acquire(n)).await {
                Ok(res) => res,
                Err(_) => Err(WaitError::DeadlineExceeded),
            }
        }

        /// The retry loop shared by the wait variants. Loops until the take
        /// succeeds; cancellation is layered on by the callers.
        async fn acquire(&self, n: u64) -> Result<(), WaitError> {
            // Checked before touching the clock: no amount of waiting can
            // satisfy a request larger than the bucket.
            if unlikely(n > self.capacity()) {
                return Err(WaitError::ExceedsCapacity);
            }
            if self.add_n(n) {
                return Ok(());
            }
            let period = self.tick_period();
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if self.add_n(n) {
                    return Ok(());
                }
            }
        }

        /// Wait-loop cadence: the refill interval, floored at tokio's timer
        /// granularity so a sub-millisecond interval cannot stall the ticker.
        fn tick_period(&self) -> Duration {
            self.refill_every.max(Duration::from_millis(1))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::error::InvalidRate;

    fn manual_limiter(
        max_tokens: u64,
        rate: u64,
        per: Duration,
    ) -> (RateLimiter<Arc<ManualClock>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let limiter =
            RateLimiter::with_clock(max_tokens, rate, per, Arc::clone(&clock)).unwrap();
        (limiter, clock)
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert_eq!(
            Err(InvalidRate),
            RateLimiter::new(100, 0, Duration::from_secs(1)).map(|_| ())
        );
    }

    #[test]
    fn refill_interval_is_per_over_rate() {
        let limiter = RateLimiter::new(100, 10, Duration::from_secs(1)).unwrap();
        assert_eq!(Duration::from_millis(100), limiter.refill_interval());
        assert_eq!(100, limiter.capacity());

        let limiter = RateLimiter::new(100, 10, Duration::from_secs(60)).unwrap();
        assert_eq!(Duration::from_secs(6), limiter.refill_interval());
    }

    #[test]
    fn starts_with_full_burst() {
        let (limiter, _clock) = manual_limiter(4, 10, Duration::from_secs(1));
        assert!(limiter.add());
        assert!(limiter.add());
        assert!(limiter.add());
        assert!(limiter.add());
        assert!(!limiter.add());
    }

    #[test]
    fn add_n_is_all_or_nothing() {
        let (limiter, _clock) = manual_limiter(10, 10, Duration::from_secs(1));
        assert!(limiter.add_n(10));
        assert!(!limiter.add_n(10));
        assert_eq!(0, limiter.available());
    }

    #[test]
    fn token_refreshes_after_one_interval() {
        // 10 permits per second, so one permit every 100ms.
        let (limiter, clock) = manual_limiter(10, 10, Duration::from_secs(1));
        assert!(limiter.add_n(10));

        // well short of half an interval, nothing earned yet
        clock.advance(0.01);
        assert!(!limiter.add());

        // slightly more than one interval since the drain
        clock.advance(0.091);
        assert!(limiter.add());
        assert!(!limiter.add());
    }

    #[test]
    fn sub_interval_elapsed_time_accumulates() {
        let (limiter, clock) = manual_limiter(10, 10, Duration::from_secs(1));
        assert!(limiter.add_n(10));

        // each observation is under half an interval, so nothing is credited
        // and the refill timestamp must not move
        clock.advance(0.04);
        assert!(!limiter.add());
        clock.advance(0.03);
        assert!(!limiter.add());

        // the pieces add up to a full interval
        clock.advance(0.03);
        assert!(limiter.add());
    }

    #[test]
    fn refill_rounds_to_nearest() {
        let (limiter, clock) = manual_limiter(10, 10, Duration::from_secs(1));
        assert!(limiter.add_n(10));

        // 1.4 intervals round down to one permit
        clock.advance(0.14);
        assert_eq!(1, limiter.available());
        assert!(limiter.add());

        // 1.6 intervals round up to two
        clock.advance(0.16);
        assert_eq!(2, limiter.available());
        assert!(limiter.add_n(2));
    }

    #[test]
    fn one_gap_credits_many_intervals() {
        let (limiter, clock) = manual_limiter(10, 10, Duration::from_secs(1));
        assert!(limiter.add_n(10));
        clock.advance(0.53);
        assert_eq!(5, limiter.available());
    }

    #[test]
    fn refill_clamps_to_capacity() {
        let (limiter, clock) = manual_limiter(10, 10, Duration::from_secs(1));
        assert!(limiter.add_n(10));
        // far more elapsed time than the bucket can absorb
        clock.advance(60.0);
        assert_eq!(10, limiter.available());
    }

    #[test]
    fn reconciliation_is_idempotent() {
        let (limiter, clock) = manual_limiter(10, 10, Duration::from_secs(1));
        assert!(limiter.add_n(10));
        clock.advance(0.22);
        // repeated observations with no elapsed time change nothing
        assert_eq!(2, limiter.available());
        assert_eq!(2, limiter.available());
        assert_eq!(2, limiter.available());
    }

    #[test]
    fn zero_interval_refills_instantly() {
        // per / rate rounds to a zero-length interval; the limiter degrades
        // to "always full" rather than panicking
        let (limiter, clock) = manual_limiter(5, 1_000, Duration::from_nanos(1));
        assert!(limiter.add_n(5));
        clock.advance(1e-9);
        assert!(limiter.add_n(5));
    }

    #[test]
    fn contended_takes_never_exceed_capacity() {
        let clock = Arc::new(ManualClock::default());
        // rate of 1/s and no advancing clock: the burst is all there is
        let limiter = Arc::new(
            RateLimiter::with_clock(8_000, 1, Duration::from_secs(1), Arc::clone(&clock)).unwrap(),
        );
        std::thread::scope(|s| {
            for _ in 0..4 {
                let limiter = Arc::clone(&limiter);
                s.spawn(move || {
                    for _ in 0..2_000 {
                        assert!(limiter.add());
                    }
                });
            }
        });
        assert!(!limiter.add());
        assert_eq!(0, limiter.available());
    }

    #[cfg(feature = "async")]
    mod wait {
        use super::*;
        use crate::clock::TokioClock;
        use crate::error::WaitError;

        use tokio_util::sync::CancellationToken;

        fn tokio_limiter(max_tokens: u64, rate: u64, per: Duration) -> RateLimiter<TokioClock> {
            RateLimiter::with_clock(max_tokens, rate, per, TokioClock::default()).unwrap()
        }

        #[tokio::test(start_paused = true)]
        async fn wait_returns_once_a_permit_frees_up() {
            let limiter = tokio_limiter(100, 10, Duration::from_secs(1));
            assert!(limiter.add_n(100));

            let cancel = CancellationToken::new();
            let start = tokio::time::Instant::now();
            assert_eq!(Ok(()), limiter.wait(&cancel).await);
            // one refill interval is 100ms
            assert!(start.elapsed() >= Duration::from_millis(100));
        }

        #[tokio::test(start_paused = true)]
        async fn wait_n_accumulates_enough_permits() {
            let limiter = tokio_limiter(100, 10, Duration::from_secs(1));
            assert!(limiter.add_n(100));

            let cancel = CancellationToken::new();
            let start = tokio::time::Instant::now();
            assert_eq!(Ok(()), limiter.wait_n(20, &cancel).await);
            // 20 permits at 10/s takes two seconds of refill
            assert!(start.elapsed() >= Duration::from_secs(2));
        }

        #[tokio::test(start_paused = true)]
        async fn wait_with_permits_already_available_is_immediate() {
            let limiter = tokio_limiter(100, 10, Duration::from_secs(1));
            let cancel = CancellationToken::new();
            let start = tokio::time::Instant::now();
            assert_eq!(Ok(()), limiter.wait_n(100, &cancel).await);
            assert_eq!(Duration::ZERO, start.elapsed());
        }

        #[tokio::test(start_paused = true)]
        async fn oversized_request_fails_without_waiting() {
            let limiter = tokio_limiter(100, 10, Duration::from_secs(1));
            let cancel = CancellationToken::new();
            let start = tokio::time::Instant::now();
            assert_eq!(
                Err(WaitError::ExceedsCapacity),
                limiter.wait_n(200, &cancel).await
            );
            assert_eq!(Duration::ZERO, start.elapsed());
        }

        #[tokio::test(start_paused = true)]
        async fn cancellation_cuts_the_wait_short() {
            // one permit every 6 seconds, so the cancel at 500ms wins
            let limiter = tokio_limiter(100, 10, Duration::from_secs(60));
            assert!(limiter.add_n(100));

            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            let start = tokio::time::Instant::now();
            let (res, ()) = tokio::join!(limiter.wait(&cancel), async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                trigger.cancel();
            });
            assert_eq!(Err(WaitError::Cancelled), res);
            assert!(start.elapsed() < Duration::from_secs(1));
        }

        #[tokio::test(start_paused = true)]
        async fn deadline_cuts_the_wait_short() {
            let limiter = tokio_limiter(100, 10, Duration::from_secs(60));
            assert!(limiter.add_n(100));

            let start = tokio::time::Instant::now();
            let deadline = start + Duration::from_millis(500);
            assert_eq!(
                Err(WaitError::DeadlineExceeded),
                limiter.wait_until(deadline).await
            );
            assert!(start.elapsed() < Duration::from_secs(1));
        }

        #[tokio::test(start_paused = true)]
        async fn deadline_generous_enough_succeeds() {
            let limiter = tokio_limiter(100, 10, Duration::from_secs(1));
            assert!(limiter.add_n(100));

            let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
            assert_eq!(Ok(()), limiter.wait_n_until(20, deadline).await);
        }

        #[tokio::test(start_paused = true)]
        async fn multiple_waiters_all_get_served() {
            let limiter = Arc::new(tokio_limiter(10, 10, Duration::from_secs(1)));
            assert!(limiter.add_n(10));

            let cancel = CancellationToken::new();
            let (a, b, c) = tokio::join!(
                limiter.wait(&cancel),
                limiter.wait(&cancel),
                limiter.wait(&cancel)
            );
            assert_eq!(Ok(()), a);
            assert_eq!(Ok(()), b);
            assert_eq!(Ok(()), c);
        }
    }
}
