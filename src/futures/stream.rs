use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use futures::Stream;
use pin_project_lite::pin_project;
use tokio::time::{Instant, Sleep, sleep_until};

use crate::clock::Clock;
use crate::limiter::RateLimiter;

pin_project! {
    /// A stream wrapper that admits one item per permit.
    ///
    /// Each item costs a single permit from the limiter's non-blocking path.
    /// When the bucket is dry the item is parked and the stream naps for one
    /// refill interval before retrying, so delivery converges on the
    /// configured rate without busy-polling.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    ///
    /// use futures::stream;
    /// use sluice::RateLimiter;
    /// use sluice::futures::RateLimitedStreamExt;
    ///
    /// # async fn example() {
    /// let limiter = RateLimiter::new(5, 10, Duration::from_secs(1)).unwrap();
    /// let throttled = stream::iter(0..100).rate_limit(limiter);
    /// # }
    /// ```
    pub struct RateLimitedStream<S, C>
    where
        S: Stream,
        C: Clock,
    {
        #[pin]
        stream: S,
        limiter: RateLimiter<C>,
        #[pin]
        delay: Option<Sleep>,
        pending: Option<S::Item>,
    }
}

impl<S, C> RateLimitedStream<S, C>
where
    S: Stream,
    C: Clock,
{
    /// Creates a new rate-limited stream around `stream`, spending permits
    /// from `limiter`.
    pub fn new(stream: S, limiter: RateLimiter<C>) -> Self {
        Self {
            stream,
            limiter,
            delay: None,
            pending: None,
        }
    }

    /// Returns a reference to the underlying limiter.
    pub fn limiter(&self) -> &RateLimiter<C> {
        &self.limiter
    }

    /// Permits currently available in the limiter's bucket.
    pub fn available(&self) -> u64 {
        self.limiter.available()
    }
}

fn nap(mut delay: Pin<&mut Option<Sleep>>, period: Duration) {
    // sub-millisecond intervals are floored at tokio's timer granularity
    let deadline = Instant::now() + period.max(Duration::from_millis(1));
    if let Some(d) = delay.as_mut().as_pin_mut() {
        d.reset(deadline);
    } else {
        delay.set(Some(sleep_until(deadline)));
    }
}

impl<S, C> Stream for RateLimitedStream<S, C>
where
    S: Stream,
    C: Clock,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            // an item parked earlier is still waiting on its permit
            if this.pending.is_some() {
                if let Some(delay) = this.delay.as_mut().as_pin_mut() {
                    ready!(delay.poll(cx));
                }
                this.delay.set(None);
                if this.limiter.add() {
                    return Poll::Ready(this.pending.take());
                }
                nap(this.delay.as_mut(), this.limiter.refill_interval());
                continue;
            }

            let Some(item) = ready!(this.stream.as_mut().poll_next(cx)) else {
                return Poll::Ready(None);
            };
            if this.limiter.add() {
                return Poll::Ready(Some(item));
            }
            *this.pending = Some(item);
            nap(this.delay.as_mut(), this.limiter.refill_interval());
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let pending = usize::from(self.pending.is_some());
        let (lower, upper) = self.stream.size_hint();
        (
            lower.saturating_add(pending),
            upper.and_then(|u| u.checked_add(pending)),
        )
    }
}
