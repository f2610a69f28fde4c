//! Injectable monotonic time source.

/// Millisecond-resolution monotonic instant.
pub type Instant = fugit::TimerInstantU64<1_000>;
/// Millisecond-resolution duration.
pub type Duration = fugit::TimerDurationU64<1_000>;

/// Monotonic clock feeding the sensor read-interval timer.
///
/// Implement this over whatever monotonic the platform provides: a timer
/// peripheral, an RTOS tick counter, `std::time::Instant` on a host. The
/// returned instants must never go backwards.
pub trait Clock {
    fn now(&mut self) -> Instant;
}

impl<C: Clock> Clock for &mut C {
    fn now(&mut self) -> Instant {
        C::now(self)
    }
}

/// Fake clock for testing
#[cfg(any(test, feature = "fake"))]
pub mod fake {
    use core::cell::Cell;

    use super::{Clock, Duration, Instant};

    /// A clock that only moves when told to.
    ///
    /// Implements [`Clock`] for `&FakeClock`, so a test can keep a handle to
    /// the clock while the reader owns another.
    #[derive(Debug, Default)]
    pub struct FakeClock {
        ticks: Cell<u64>,
    }

    impl FakeClock {
        pub const fn new() -> Self {
            Self {
                ticks: Cell::new(0),
            }
        }

        pub fn advance(&self, duration: Duration) {
            self.ticks.set(self.ticks.get() + duration.ticks());
        }
    }

    impl Clock for &FakeClock {
        fn now(&mut self) -> Instant {
            Instant::from_ticks(self.ticks.get())
        }
    }
}
