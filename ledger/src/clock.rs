//! # Clock Capability
//!
//! Ledger operations take the transaction timestamp as an explicit argument
//! — in the original deployment that was the block time, and handing it in
//! keeps every state transition replayable and every test deterministic.
//! Something still has to *produce* that timestamp at the call site, and
//! that something is a [`Clock`].
//!
//! `haven-node` injects [`SystemClock`]; tests that drive multi-window or
//! multi-month scenarios use [`ManualClock`] and move time by hand.

use chrono::{DateTime, Utc};

/// Supplies the current authoritative timestamp.
pub trait Clock: Send + Sync {
    /// Returns "now" in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time from the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Test fixture.
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::atomic::AtomicI64,
}

impl ManualClock {
    /// Starts the clock at the given Unix timestamp (seconds).
    pub fn starting_at(unix_seconds: i64) -> Self {
        Self {
            now: std::sync::atomic::AtomicI64::new(unix_seconds),
        }
    }

    /// Advances the clock by `seconds`.
    pub fn advance(&self, seconds: i64) {
        self.now
            .fetch_add(seconds, std::sync::atomic::Ordering::SeqCst);
    }

    /// Jumps the clock to an absolute Unix timestamp.
    ///
    /// Time in this system is monotonically non-decreasing across calls;
    /// jumping backwards is a test-authoring bug, so we debug-assert it.
    pub fn set(&self, unix_seconds: i64) {
        debug_assert!(unix_seconds >= self.now.load(std::sync::atomic::Ordering::SeqCst));
        self.now
            .store(unix_seconds, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let secs = self.now.load(std::sync::atomic::Ordering::SeqCst);
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
    }
}
