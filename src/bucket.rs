use likely_stable::likely;

/// A bounded counter of available permits.
///
/// The bucket is the storage half of the rate limiter: it knows nothing about
/// time and carries no synchronization of its own. Mutating methods take
/// `&mut self`, so exclusive access is enforced by the borrow checker; to
/// share a bucket between callers, put it behind a mutex the way
/// [`RateLimiter`](crate::RateLimiter) does.
///
/// A bucket starts full.
///
/// # Examples
///
/// ```rust
/// use sluice::Bucket;
///
/// let mut bucket = Bucket::new(10);
/// assert!(bucket.take_n(10));
/// assert!(!bucket.take());
///
/// bucket.refill(3);
/// assert_eq!(bucket.available(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct Bucket {
    capacity: u64,
    available: u64,
}

impl Bucket {
    /// Creates a bucket holding `capacity` permits, filled to the brim.
    pub const fn new(capacity: u64) -> Self {
        Self {
            capacity,
            available: capacity,
        }
    }

    /// Takes a single permit from the bucket.
    ///
    /// Returns `true` if a permit was available.
    pub fn take(&mut self) -> bool {
        self.take_n(1)
    }

    /// Takes `n` permits from the bucket, all or nothing.
    ///
    /// If fewer than `n` permits are available the bucket is left untouched
    /// and `false` is returned; partial consumption never happens.
    pub fn take_n(&mut self, n: u64) -> bool {
        if likely(self.available >= n) {
            self.available -= n;
            true
        } else {
            false
        }
    }

    /// Puts `n` permits back into the bucket, clamped to its capacity.
    ///
    /// Over-refilling is silently truncated, never an error.
    pub fn refill(&mut self, n: u64) {
        self.available = self.available.saturating_add(n).min(self.capacity);
    }

    /// Permits currently available.
    pub const fn available(&self) -> u64 {
        self.available
    }

    /// The most permits this bucket can ever hold.
    pub const fn capacity(&self) -> u64 {
        self.capacity
    }
}
