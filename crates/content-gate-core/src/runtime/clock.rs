// content-gate-core/src/runtime/clock.rs
// ============================================================================
// Module: Content Gate Clocks
// Description: Wall-clock and manually driven time sources.
// Purpose: Let services read time through one seam that tests can control.
// Dependencies: crate::interfaces
// ============================================================================

//! Wall-clock and manually driven time sources.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use crate::core::time::Timestamp;
use crate::interfaces::Clock;

// ============================================================================
// SECTION: Clocks
// ============================================================================

/// Wall-clock time source.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| i64::try_from(duration.as_millis()).unwrap_or(i64::MAX));
        Timestamp::from_unix_millis(millis)
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    /// Current time in unix milliseconds.
    millis: AtomicI64,
}

impl ManualClock {
    /// Creates a clock pinned at `start`.
    #[must_use]
    pub const fn new(start: Timestamp) -> Self {
        Self {
            millis: AtomicI64::new(start.as_unix_millis()),
        }
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: Timestamp) {
        self.millis.store(now.as_unix_millis(), Ordering::SeqCst);
    }

    /// Advances the clock by `millis`.
    pub fn advance_millis(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_unix_millis(self.millis.load(Ordering::SeqCst))
    }
}
