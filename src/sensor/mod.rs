//! Sensor abstraction: one read contract over three wire protocols.
//!
//! Each supported sensor model implements [`Probe`], a single blocking
//! hardware transaction. [`SensorReader`] wraps a probe with the minimum
//! read-interval cache so callers can poll as often as they like without
//! hammering the bus.

pub mod dht;
pub mod ds18b20;

use crate::clock::{Clock, Duration, Instant};

/// Hardware is polled at most once per this interval; in between, reads are
/// served from the cache. 1 s is the slowest rate the supported sensors
/// tolerate (the DHT11 datasheet limit).
pub const MIN_READ_INTERVAL: Duration = Duration::millis(1_000);

/// Supported sensor models.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorKind {
    Dht11,
    Dht22,
    Ds18b20,
}

impl SensorKind {
    /// Smallest temperature difference the sensor can resolve, in °C.
    ///
    /// Readings closer to the setpoint than this are indistinguishable from
    /// it and must not drive the actuators.
    pub const fn precision(self) -> f32 {
        match self {
            Self::Dht11 => 0.5,
            Self::Dht22 => 0.05,
            Self::Ds18b20 => 0.03,
        }
    }

    /// Whether the sensor measures relative humidity at all.
    pub const fn has_humidity(self) -> bool {
        !matches!(self, Self::Ds18b20)
    }
}

/// Why a sensor query produced no value.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// Transient physical failure: sensor absent, bus fault, checksum
    /// mismatch. The next read after the minimum interval retries.
    Unreadable,
    /// The sensor kind cannot perform this query at all. Permanent; do not
    /// retry.
    Unsupported,
}

impl SensorError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unreadable => "sensor unreadable",
            Self::Unsupported => "operation unsupported",
        }
    }
}

impl core::fmt::Display for SensorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One temperature/humidity pair fresh off the wire.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sample {
    /// Degrees Celsius.
    pub temperature: f32,
    /// Percent relative humidity. `None` for kinds without a hygrometer.
    pub humidity: Option<f32>,
}

/// A sample plus the instant it was taken.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reading {
    pub temperature: f32,
    pub humidity: Option<f32>,
    pub timestamp: Instant,
}

/// A single physical sensor transaction.
pub trait Probe {
    fn kind(&self) -> SensorKind;

    /// Run one full read transaction against the hardware.
    fn sample(&mut self) -> Result<Sample, SensorError>;
}

/// Rate-limited sensor front end.
///
/// Owns the probe and a monotonic [`Clock`]; a successful transaction arms a
/// timer and every `read` within [`MIN_READ_INTERVAL`] of it returns the
/// cached [`Reading`] without touching the hardware. A failed transaction
/// leaves both the cache and the timer alone, so the next call retries.
pub struct SensorReader<P, C> {
    probe: P,
    clock: C,
    cached: Option<Reading>,
}

impl<P: Probe, C: Clock> SensorReader<P, C> {
    pub fn new(probe: P, clock: C) -> Self {
        Self {
            probe,
            clock,
            cached: None,
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.probe.kind()
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }
    pub fn probe_mut(&mut self) -> &mut P {
        &mut self.probe
    }

    /// The last successful reading, if any. Never triggers a transaction.
    pub fn last_reading(&self) -> Option<Reading> {
        self.cached
    }

    /// Current reading, from cache if the last successful transaction is
    /// younger than [`MIN_READ_INTERVAL`].
    pub fn read(&mut self) -> Result<Reading, SensorError> {
        let now = self.clock.now();

        if let Some(cached) = self.cached {
            match now.checked_duration_since(cached.timestamp) {
                Some(age) if age < MIN_READ_INTERVAL => return Ok(cached),
                _ => {}
            }
        }

        let sample = self.probe.sample()?;
        #[cfg(feature = "defmt")]
        defmt::trace!("sensor sampled: {}", sample);

        let reading = Reading {
            temperature: sample.temperature,
            humidity: sample.humidity,
            timestamp: now,
        };
        self.cached = Some(reading);
        Ok(reading)
    }

    /// Current temperature in °C.
    pub fn temperature(&mut self) -> Result<f32, SensorError> {
        self.read().map(|reading| reading.temperature)
    }

    /// Current relative humidity in percent.
    ///
    /// Fails with [`SensorError::Unsupported`] before any bus traffic when
    /// the kind has no hygrometer; the condition is capability-level, not a
    /// wiring fault.
    pub fn humidity(&mut self) -> Result<f32, SensorError> {
        if !self.kind().has_humidity() {
            return Err(SensorError::Unsupported);
        }
        self.read()?.humidity.ok_or(SensorError::Unreadable)
    }
}

/// Fake probe for testing
#[cfg(any(test, feature = "fake"))]
pub mod fake {
    use core::cell::Cell;

    use super::{Probe, Sample, SensorError, SensorKind};

    /// A probe that reports whatever the test tells it to.
    ///
    /// Implements [`Probe`] for `&FakeProbe`, so a test can keep adjusting
    /// the values while a reader owns another handle.
    #[derive(Debug)]
    pub struct FakeProbe {
        kind: SensorKind,
        temperature: Cell<f32>,
        humidity: Cell<Option<f32>>,
        failing: Cell<bool>,
        samples: Cell<usize>,
    }

    impl FakeProbe {
        pub fn new(kind: SensorKind, temperature: f32) -> Self {
            let humidity = kind.has_humidity().then_some(50.0);
            Self {
                kind,
                temperature: Cell::new(temperature),
                humidity: Cell::new(humidity),
                failing: Cell::new(false),
                samples: Cell::new(0),
            }
        }

        pub fn set_temperature(&self, temperature: f32) {
            self.temperature.set(temperature);
        }

        pub fn set_humidity(&self, humidity: Option<f32>) {
            self.humidity.set(humidity);
        }

        /// Make every subsequent transaction fail with `Unreadable`.
        pub fn set_failing(&self, failing: bool) {
            self.failing.set(failing);
        }

        /// Number of physical transactions attempted so far.
        pub fn samples_taken(&self) -> usize {
            self.samples.get()
        }
    }

    impl Probe for &FakeProbe {
        fn kind(&self) -> SensorKind {
            self.kind
        }

        fn sample(&mut self) -> Result<Sample, SensorError> {
            self.samples.set(self.samples.get() + 1);
            if self.failing.get() {
                return Err(SensorError::Unreadable);
            }
            Ok(Sample {
                temperature: self.temperature.get(),
                humidity: self.humidity.get(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{fake::FakeProbe, SensorError, SensorKind, SensorReader, MIN_READ_INTERVAL};
    use crate::clock::{fake::FakeClock, Duration};

    #[test]
    fn read_within_interval_returns_cached_reading() {
        let clock = FakeClock::new();
        let probe = FakeProbe::new(SensorKind::Dht22, 21.5);
        let mut reader = SensorReader::new(&probe, &clock);

        let first = reader.read().unwrap();
        clock.advance(Duration::millis(500));
        probe.set_temperature(30.0);
        let second = reader.read().unwrap();

        assert_eq!(first, second);
        assert_eq!(probe.samples_taken(), 1);
    }

    #[test]
    fn read_after_interval_polls_again() {
        let clock = FakeClock::new();
        let probe = FakeProbe::new(SensorKind::Dht22, 21.5);
        let mut reader = SensorReader::new(&probe, &clock);

        reader.read().unwrap();
        clock.advance(MIN_READ_INTERVAL);
        probe.set_temperature(30.0);

        let reading = reader.read().unwrap();
        assert_eq!(reading.temperature, 30.0);
        assert_eq!(probe.samples_taken(), 2);
    }

    #[test]
    fn failure_leaves_cache_and_timer_untouched() {
        let clock = FakeClock::new();
        let probe = FakeProbe::new(SensorKind::Dht22, 21.5);
        let mut reader = SensorReader::new(&probe, &clock);

        let good = reader.read().unwrap();
        clock.advance(MIN_READ_INTERVAL);
        probe.set_failing(true);

        assert_eq!(reader.read(), Err(SensorError::Unreadable));
        assert_eq!(reader.last_reading(), Some(good));

        // Recovery on the next attempt; the failed one armed no timer.
        probe.set_failing(false);
        probe.set_temperature(22.0);
        assert_eq!(reader.read().unwrap().temperature, 22.0);
    }

    #[test]
    fn failure_is_masked_while_cache_is_fresh() {
        let clock = FakeClock::new();
        let probe = FakeProbe::new(SensorKind::Dht11, 19.0);
        let mut reader = SensorReader::new(&probe, &clock);

        reader.read().unwrap();
        probe.set_failing(true);
        clock.advance(Duration::millis(250));

        assert_eq!(reader.read().unwrap().temperature, 19.0);
        assert_eq!(probe.samples_taken(), 1);
    }

    #[test]
    fn first_read_with_no_cache_fails_through() {
        let clock = FakeClock::new();
        let probe = FakeProbe::new(SensorKind::Ds18b20, 0.0);
        probe.set_failing(true);
        let mut reader = SensorReader::new(&probe, &clock);

        assert_eq!(reader.read(), Err(SensorError::Unreadable));
        assert_eq!(reader.last_reading(), None);
    }

    #[test]
    fn humidity_unsupported_without_touching_the_bus() {
        let clock = FakeClock::new();
        let probe = FakeProbe::new(SensorKind::Ds18b20, 25.0);
        let mut reader = SensorReader::new(&probe, &clock);

        assert_eq!(reader.humidity(), Err(SensorError::Unsupported));
        // Even with a broken sensor the answer stays Unsupported.
        probe.set_failing(true);
        assert_eq!(reader.humidity(), Err(SensorError::Unsupported));
        assert_eq!(probe.samples_taken(), 0);
    }

    #[test]
    fn humidity_reported_for_dht_kinds() {
        let clock = FakeClock::new();
        let probe = FakeProbe::new(SensorKind::Dht22, 25.0);
        probe.set_humidity(Some(61.2));
        let mut reader = SensorReader::new(&probe, &clock);

        assert_eq!(reader.humidity(), Ok(61.2));
    }

    #[test]
    fn precision_per_kind() {
        assert_eq!(SensorKind::Dht11.precision(), 0.5);
        assert_eq!(SensorKind::Dht22.precision(), 0.05);
        assert_eq!(SensorKind::Ds18b20.precision(), 0.03);
    }
}
