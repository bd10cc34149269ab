//! Wall-clock abstraction and randomized TTL sampling.
//!
//! Entries expire at `fetch_time + Uniform(min_sec, max_sec)`. Drawing the
//! TTL per entry spreads refreshes over time instead of letting a burst of
//! fetches expire in the same instant and stampede the source.
//!
//! ## Key Components
//!
//! - [`Clock`]: time source trait; [`SystemClock`] for production,
//!   [`ManualClock`] for deterministic expiry tests.
//! - [`Lifetime`]: the `[min_sec, max_sec]` TTL window.
//! - [`TtlSampler`]: per-cache PRNG that draws expiry instants. Seeded from
//!   wall-clock nanos XOR the process id by default; injectable for tests.
//!
//! The sampler is mutated only while the cache's write lock is held, so it
//! needs no synchronization of its own.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Source of the current wall-clock instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Production clock backed by [`SystemTime::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Manually advanced clock for tests.
///
/// Starts at a fixed base instant and only moves when [`advance`] is called,
/// so expiry behavior can be driven without sleeping.
///
/// [`advance`]: ManualClock::advance
///
/// # Example
///
/// ```
/// use dictcache::clock::{Clock, ManualClock};
/// use std::time::{Duration, SystemTime, UNIX_EPOCH};
///
/// let clock = ManualClock::new(UNIX_EPOCH + Duration::from_secs(100));
/// let before = clock.now();
/// clock.advance(Duration::from_secs(2));
/// assert_eq!(clock.now(), before + Duration::from_secs(2));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    base: SystemTime,
    offset_millis: AtomicU64,
}

impl ManualClock {
    /// Creates a clock frozen at `base`.
    pub fn new(base: SystemTime) -> Self {
        Self {
            base,
            offset_millis: AtomicU64::new(0),
        }
    }

    /// Moves the clock forward by `delta` (millisecond granularity).
    pub fn advance(&self, delta: Duration) {
        self.offset_millis
            .fetch_add(delta.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        self.base + Duration::from_millis(self.offset_millis.load(Ordering::SeqCst))
    }
}

/// TTL window in whole seconds, `min_sec <= max_sec`.
///
/// Equal bounds collapse to a deterministic TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifetime {
    pub min_sec: u64,
    pub max_sec: u64,
}

impl Lifetime {
    pub fn new(min_sec: u64, max_sec: u64) -> Self {
        Self { min_sec, max_sec }
    }
}

/// Per-cache PRNG drawing expiry instants inside a [`Lifetime`] window.
pub struct TtlSampler {
    rng: SmallRng,
    lifetime: Lifetime,
}

impl TtlSampler {
    /// Creates a sampler seeded from a nondeterministic source.
    pub fn new(lifetime: Lifetime) -> Self {
        Self::with_seed(lifetime, entropy_seed())
    }

    /// Creates a sampler with an explicit seed; used by tests to make TTL
    /// draws reproducible.
    pub fn with_seed(lifetime: Lifetime, seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            lifetime,
        }
    }

    /// Returns `now` plus a TTL drawn uniformly from the window.
    pub fn fresh_expiry(&mut self, now: SystemTime) -> SystemTime {
        let secs = self
            .rng
            .gen_range(self.lifetime.min_sec..=self.lifetime.max_sec);
        now + Duration::from_secs(secs)
    }

    /// The configured TTL window.
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }
}

impl fmt::Debug for TtlSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlSampler")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

/// Wall-clock nanoseconds XOR process id; distinct per instance in practice.
fn entropy_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    nanos ^ u64::from(std::process::id())
}
