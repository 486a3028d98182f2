mod stream;

pub use stream::RateLimitedStream;

use futures::Stream;

use crate::{Clock, RateLimiter};

pub trait RateLimitedStreamExt<S, C>
where
    S: Stream,
    C: Clock,
{
    fn rate_limit(self, limiter: RateLimiter<C>) -> RateLimitedStream<S, C>;
}

impl<S, C> RateLimitedStreamExt<S, C> for S
where
    S: Stream,
    C: Clock,
{
    fn rate_limit(self, limiter: RateLimiter<C>) -> RateLimitedStream<S, C> {
        RateLimitedStream::new(self, limiter)
    }
}
