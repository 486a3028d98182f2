use std::fmt::{Display, Formatter};

/// The limiter was configured with a rate of zero.
///
/// A zero rate would make the refill interval undefined, so construction
/// rejects it up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidRate;

impl Display for InvalidRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "rate must be positive")
    }
}

impl std::error::Error for InvalidRate {}

/// Errors surfaced by the blocking wait surface of
/// [`RateLimiter`](crate::RateLimiter).
///
/// A denied non-blocking `add` is not an error; only the wait path can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// More permits were requested than the bucket can ever hold, so no
    /// amount of waiting could satisfy the request.
    ExceedsCapacity,
    /// The caller's cancellation token fired before a permit was granted.
    Cancelled,
    /// The caller's deadline elapsed before a permit was granted.
    DeadlineExceeded,
}

impl WaitError {
    /// Whether the wait ended because the caller gave up, either by
    /// cancelling or by running out its deadline.
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, WaitError::Cancelled | WaitError::DeadlineExceeded)
    }
}

impl Display for WaitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitError::ExceedsCapacity => {
                write!(f, "permits requested exceed the bucket capacity")
            }
            WaitError::Cancelled => write!(f, "wait cancelled"),
            WaitError::DeadlineExceeded => write!(f, "wait deadline exceeded"),
        }
    }
}

impl std::error::Error for WaitError {}
