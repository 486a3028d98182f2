#![doc = include_str!("../README.md")]
//!
//! # Core Components
//!
//! - [`RateLimiter`] - The limiter: a bucket plus lazy, wall-clock-driven refill
//! - [`Bucket`] - The bounded permit counter underneath it
//! - [`Clock`] trait and implementations for time sources
//! - [`WaitError`] / [`InvalidRate`] - The error surface
//!
//! # Quick Start
//!
//! ```rust
//! use std::time::Duration;
//!
//! use sluice::RateLimiter;
//!
//! // 10 permits per second with a burst of 10
//! let limiter = RateLimiter::new(10, 10, Duration::from_secs(1)).unwrap();
//!
//! if limiter.add() {
//!     // request admitted
//! }
//! ```

mod bucket;
mod clock;
mod error;
#[cfg(feature = "async")]
pub mod futures;
mod limiter;

pub use bucket::Bucket;
#[cfg(feature = "tokio")]
pub use clock::TokioClock;
pub use clock::{Clock, ManualClock, StdClock};
#[cfg(feature = "quanta")]
pub use clock::{FastClock, QuantaClock};
pub use error::{InvalidRate, WaitError};
#[cfg(feature = "async")]
pub use self::futures::RateLimitedStreamExt;
pub use limiter::RateLimiter;

#[cfg(feature = "async")]
pub use tokio_util::sync::CancellationToken;
