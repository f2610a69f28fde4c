//! Hysteresis control loop tying the sensor to the actuator pair.

use embedded_hal::digital::v2::OutputPin;
use num_traits::float::FloatCore;

use crate::{
    actuator::{Action, Actuators},
    clock::Clock,
    sensor::{Probe, Reading, SensorError, SensorKind, SensorReader},
};

/// Legacy numeric value reported by the sentinel accessors when the sensor
/// cannot be read.
pub const SENSOR_UNREADABLE: f32 = -500.0;
/// Legacy numeric value reported by the sentinel accessors when the sensor
/// kind lacks the capability.
pub const OPERATION_UNSUPPORTED: f32 = -501.0;

/// Setpoint and hysteresis band.
///
/// The thresholds are offsets from the setpoint and are expected to be
/// non-negative; they are independent of each other and take effect on the
/// next tick.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThermostatConfig {
    /// Target temperature in °C.
    pub setpoint: f32,
    /// Offset above the setpoint at which cooling engages.
    pub upper_threshold: f32,
    /// Offset below the setpoint at which heating engages.
    pub lower_threshold: f32,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            setpoint: 20.0,
            upper_threshold: 0.5,
            lower_threshold: 0.5,
        }
    }
}

/// Pin numbers as wired, kept for diagnostics and external wiring checks.
/// The crate never interprets them; the pin objects themselves do the I/O.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pinout {
    pub cooling: u8,
    pub heating: u8,
    pub sensor: u8,
}

/// On/off thermostat around a [`SensorReader`] and two actuator lines.
///
/// Call [`handle`](Thermostat::handle) periodically; the cadence is the
/// caller's choice, the sensor itself is polled at most once per
/// [`MIN_READ_INTERVAL`](crate::sensor::MIN_READ_INTERVAL). Each tick is an
/// independent, short, synchronous unit of work; drive the whole object from
/// a single context.
pub struct Thermostat<P, Clk, C, H> {
    reader: SensorReader<P, Clk>,
    actuators: Actuators<C, H>,
    config: ThermostatConfig,
    pinout: Pinout,
}

impl<E, P, Clk, C, H> Thermostat<P, Clk, C, H>
where
    P: Probe,
    Clk: Clock,
    C: OutputPin<Error = E>,
    H: OutputPin<Error = E>,
{
    pub fn new(reader: SensorReader<P, Clk>, actuators: Actuators<C, H>, pinout: Pinout) -> Self {
        Self::with_config(reader, actuators, pinout, ThermostatConfig::default())
    }

    pub fn with_config(
        reader: SensorReader<P, Clk>,
        actuators: Actuators<C, H>,
        pinout: Pinout,
        config: ThermostatConfig,
    ) -> Self {
        Self {
            reader,
            actuators,
            config,
            pinout,
        }
    }

    /// Run one control tick.
    ///
    /// Reads the sensor and drives the actuator lines through the three-zone
    /// hysteresis policy. An unreadable sensor forces [`Action::Idle`]: the
    /// hardware is never left heating or cooling against an unknown
    /// temperature. Only pin write failures propagate.
    pub fn handle(&mut self) -> Result<Action, E> {
        let action = match self.reader.temperature() {
            Ok(temperature) => {
                let action = self.classify(temperature);
                #[cfg(feature = "defmt")]
                defmt::debug!("tick: temp={=f32} action={}", temperature, action);
                action
            }
            Err(_) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("tick: sensor unreadable, idling");
                Action::Idle
            }
        };

        self.actuators.apply(action)?;
        Ok(action)
    }

    fn classify(&self, temperature: f32) -> Action {
        let ThermostatConfig {
            setpoint,
            upper_threshold,
            lower_threshold,
        } = self.config;

        if temperature > setpoint + upper_threshold {
            Action::Cooling
        } else if temperature < setpoint - lower_threshold {
            Action::Heating
        } else if FloatCore::abs(temperature - setpoint) < self.reader.kind().precision() {
            // Indistinguishable from the setpoint at this sensor's
            // precision: idle rather than chatter on measurement noise.
            Action::Idle
        } else {
            // Inside the band but clearly away from the setpoint: the lines
            // keep whatever state the previous tick left them in.
            Action::Hold
        }
    }

    /// Current temperature in °C, using the legacy numeric error convention:
    /// [`SENSOR_UNREADABLE`] when the sensor did not answer. Compare against
    /// the sentinel before using the value; [`read`](Thermostat::read) is the
    /// typed alternative.
    pub fn current_temperature(&mut self) -> f32 {
        sentinel(self.reader.temperature())
    }

    /// Current relative humidity in percent, using the legacy numeric error
    /// convention: [`SENSOR_UNREADABLE`] on a transient failure,
    /// [`OPERATION_UNSUPPORTED`] when the sensor kind has no hygrometer.
    pub fn current_humidity(&mut self) -> f32 {
        sentinel(self.reader.humidity())
    }

    /// Typed read of the current sensor state.
    pub fn read(&mut self) -> Result<Reading, SensorError> {
        self.reader.read()
    }

    pub fn kind(&self) -> SensorKind {
        self.reader.kind()
    }

    pub fn config(&self) -> ThermostatConfig {
        self.config
    }
    pub fn set_config(&mut self, config: ThermostatConfig) {
        self.config = config;
    }

    pub fn setpoint(&self) -> f32 {
        self.config.setpoint
    }
    pub fn set_setpoint(&mut self, setpoint: f32) {
        self.config.setpoint = setpoint;
    }

    pub fn upper_threshold(&self) -> f32 {
        self.config.upper_threshold
    }
    pub fn set_upper_threshold(&mut self, threshold: f32) {
        self.config.upper_threshold = threshold;
    }

    pub fn lower_threshold(&self) -> f32 {
        self.config.lower_threshold
    }
    pub fn set_lower_threshold(&mut self, threshold: f32) {
        self.config.lower_threshold = threshold;
    }

    pub fn pinout(&self) -> Pinout {
        self.pinout
    }
    pub fn cooling_pin(&self) -> u8 {
        self.pinout.cooling
    }
    pub fn heating_pin(&self) -> u8 {
        self.pinout.heating
    }
    pub fn sensor_pin(&self) -> u8 {
        self.pinout.sensor
    }

    pub fn reader(&self) -> &SensorReader<P, Clk> {
        &self.reader
    }
    pub fn reader_mut(&mut self) -> &mut SensorReader<P, Clk> {
        &mut self.reader
    }

    /// Releases the reader and the actuator pair.
    pub fn release(self) -> (SensorReader<P, Clk>, Actuators<C, H>) {
        (self.reader, self.actuators)
    }
}

fn sentinel(value: Result<f32, SensorError>) -> f32 {
    match value {
        Ok(value) => value,
        Err(SensorError::Unreadable) => SENSOR_UNREADABLE,
        Err(SensorError::Unsupported) => OPERATION_UNSUPPORTED,
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal_mock::pin::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };

    use super::*;
    use crate::{
        clock::fake::FakeClock,
        sensor::{fake::FakeProbe, MIN_READ_INTERVAL},
    };

    const PINOUT: Pinout = Pinout {
        cooling: 4,
        heating: 5,
        sensor: 7,
    };

    const CONFIG: ThermostatConfig = ThermostatConfig {
        setpoint: 22.0,
        upper_threshold: 1.0,
        lower_threshold: 1.0,
    };

    fn thermostat<'a>(
        probe: &'a FakeProbe,
        clock: &'a FakeClock,
        cooling: PinMock,
        heating: PinMock,
    ) -> Thermostat<&'a FakeProbe, &'a FakeClock, PinMock, PinMock> {
        Thermostat::with_config(
            SensorReader::new(probe, clock),
            Actuators::new(cooling, heating),
            PINOUT,
            CONFIG,
        )
    }

    #[test]
    fn above_upper_threshold_cools() {
        let clock = FakeClock::new();
        let probe = FakeProbe::new(SensorKind::Dht22, 23.5);
        let mut cooling = PinMock::new(&[PinTransaction::set(PinState::High)]);
        let mut heating = PinMock::new(&[PinTransaction::set(PinState::Low)]);

        let mut thermo = thermostat(&probe, &clock, cooling.clone(), heating.clone());
        assert_eq!(thermo.handle().unwrap(), Action::Cooling);

        cooling.done();
        heating.done();
    }

    #[test]
    fn below_lower_threshold_heats() {
        let clock = FakeClock::new();
        let probe = FakeProbe::new(SensorKind::Dht22, 20.5);
        let mut cooling = PinMock::new(&[PinTransaction::set(PinState::Low)]);
        let mut heating = PinMock::new(&[PinTransaction::set(PinState::High)]);

        let mut thermo = thermostat(&probe, &clock, cooling.clone(), heating.clone());
        assert_eq!(thermo.handle().unwrap(), Action::Heating);

        cooling.done();
        heating.done();
    }

    #[test]
    fn at_setpoint_idles_within_precision() {
        let clock = FakeClock::new();
        let probe = FakeProbe::new(SensorKind::Dht22, 22.0);
        let mut cooling = PinMock::new(&[PinTransaction::set(PinState::Low)]);
        let mut heating = PinMock::new(&[PinTransaction::set(PinState::Low)]);

        let mut thermo = thermostat(&probe, &clock, cooling.clone(), heating.clone());
        assert_eq!(thermo.handle().unwrap(), Action::Idle);

        cooling.done();
        heating.done();
    }

    #[test]
    fn inside_band_away_from_setpoint_writes_nothing() {
        let clock = FakeClock::new();
        let probe = FakeProbe::new(SensorKind::Dht22, 23.0);
        let mut cooling = PinMock::new(&[]);
        let mut heating = PinMock::new(&[]);

        let mut thermo = thermostat(&probe, &clock, cooling.clone(), heating.clone());
        assert_eq!(thermo.handle().unwrap(), Action::Hold);

        cooling.done();
        heating.done();
    }

    #[test]
    fn unreadable_sensor_forces_both_lines_off() {
        let clock = FakeClock::new();
        let probe = FakeProbe::new(SensorKind::Dht22, 23.5);
        probe.set_failing(true);
        let mut cooling = PinMock::new(&[PinTransaction::set(PinState::Low)]);
        let mut heating = PinMock::new(&[PinTransaction::set(PinState::Low)]);

        let mut thermo = thermostat(&probe, &clock, cooling.clone(), heating.clone());
        assert_eq!(thermo.handle().unwrap(), Action::Idle);

        cooling.done();
        heating.done();
    }

    #[test]
    fn sensor_loss_overrides_active_cooling() {
        let clock = FakeClock::new();
        let probe = FakeProbe::new(SensorKind::Dht22, 23.5);
        let mut cooling = PinMock::new(&[
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
        ]);
        let mut heating = PinMock::new(&[
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::Low),
        ]);

        let mut thermo = thermostat(&probe, &clock, cooling.clone(), heating.clone());
        assert_eq!(thermo.handle().unwrap(), Action::Cooling);

        clock.advance(MIN_READ_INTERVAL);
        probe.set_failing(true);
        assert_eq!(thermo.handle().unwrap(), Action::Idle);

        cooling.done();
        heating.done();
    }

    #[test]
    fn dht11_precision_widens_the_idle_zone() {
        let clock = FakeClock::new();
        // 0.3 °C off the setpoint: noise for a DHT11, a real offset for a DHT22.
        let probe = FakeProbe::new(SensorKind::Dht11, 22.3);
        let mut cooling = PinMock::new(&[PinTransaction::set(PinState::Low)]);
        let mut heating = PinMock::new(&[PinTransaction::set(PinState::Low)]);

        let mut thermo = thermostat(&probe, &clock, cooling.clone(), heating.clone());
        assert_eq!(thermo.handle().unwrap(), Action::Idle);

        cooling.done();
        heating.done();
    }

    #[test]
    fn setters_take_effect_on_the_next_tick() {
        let clock = FakeClock::new();
        let probe = FakeProbe::new(SensorKind::Dht22, 23.5);
        let mut cooling = PinMock::new(&[PinTransaction::set(PinState::High)]);
        let mut heating = PinMock::new(&[PinTransaction::set(PinState::Low)]);

        let mut thermo = thermostat(&probe, &clock, cooling.clone(), heating.clone());
        assert_eq!(thermo.handle().unwrap(), Action::Cooling);

        // Re-centering the band: 23.5 is now inside it, so the next tick
        // holds and issues no further writes.
        thermo.set_setpoint(23.0);
        assert_eq!(thermo.setpoint(), 23.0);
        clock.advance(MIN_READ_INTERVAL);
        assert_eq!(thermo.handle().unwrap(), Action::Hold);

        cooling.done();
        heating.done();
    }

    #[test]
    fn sentinel_temperature_on_failure() {
        let clock = FakeClock::new();
        let probe = FakeProbe::new(SensorKind::Dht22, 23.5);
        probe.set_failing(true);

        let mut thermo = thermostat(&probe, &clock, PinMock::new(&[]), PinMock::new(&[]));
        assert_eq!(thermo.current_temperature(), SENSOR_UNREADABLE);
    }

    #[test]
    fn sentinel_humidity_distinguishes_unsupported() {
        let clock = FakeClock::new();
        let probe = FakeProbe::new(SensorKind::Ds18b20, 25.0);
        // Wiring state is irrelevant: the capability is absent by design.
        probe.set_failing(true);

        let mut thermo = thermostat(&probe, &clock, PinMock::new(&[]), PinMock::new(&[]));
        assert_eq!(thermo.current_humidity(), OPERATION_UNSUPPORTED);
        assert_eq!(thermo.current_temperature(), SENSOR_UNREADABLE);
    }

    #[test]
    fn accessors_round_trip() {
        let clock = FakeClock::new();
        let probe = FakeProbe::new(SensorKind::Dht22, 22.0);

        let mut thermo = thermostat(&probe, &clock, PinMock::new(&[]), PinMock::new(&[]));
        assert_eq!(thermo.pinout(), PINOUT);
        assert_eq!(thermo.cooling_pin(), 4);
        assert_eq!(thermo.heating_pin(), 5);
        assert_eq!(thermo.sensor_pin(), 7);
        assert_eq!(thermo.kind(), SensorKind::Dht22);

        thermo.set_upper_threshold(2.5);
        thermo.set_lower_threshold(0.25);
        assert_eq!(thermo.upper_threshold(), 2.5);
        assert_eq!(thermo.lower_threshold(), 0.25);
    }
}
