#![cfg_attr(not(test), no_std)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::wildcard_imports)]

//! On/off thermostat driver with a unified sensor abstraction.
//!
//! A [`Thermostat`] reads ambient temperature (and humidity, where the
//! sensor has it) through one of three interchangeable probes — DHT11,
//! DHT22, or a DS18B20 on a 1-Wire bus — and drives a cooling and a heating
//! line to keep the temperature inside a configurable band around a
//! setpoint. Control is strictly on/off with a three-zone hysteresis
//! policy; a sensor that stops answering always parks both lines off.
//!
//! The crate is `no_std` and generic over `embedded-hal` 0.2 pins and
//! delays, so the same code runs against any HAL and against mocks on the
//! host. Physical sensors are polled at most once per second regardless of
//! how often the control loop ticks; see [`sensor::SensorReader`].
//!
//! # Example
//!
//! ```
//! use core::cell::Cell;
//! use core::convert::Infallible;
//! use embedded_hal::digital::v2::OutputPin;
//! use hystat::{
//!     Action, Actuators, Clock, Instant, Pinout, Probe, Sample, SensorError,
//!     SensorKind, SensorReader, Thermostat, ThermostatConfig,
//! };
//!
//! // The platform supplies a sensor variant, a monotonic clock, and two
//! // output lines. Stubs stand in for them here.
//! struct RoomSensor;
//! impl Probe for RoomSensor {
//!     fn kind(&self) -> SensorKind {
//!         SensorKind::Dht22
//!     }
//!     fn sample(&mut self) -> Result<Sample, SensorError> {
//!         Ok(Sample { temperature: 23.7, humidity: Some(40.2) })
//!     }
//! }
//!
//! struct Uptime(Cell<u64>);
//! impl Clock for Uptime {
//!     fn now(&mut self) -> Instant {
//!         self.0.set(self.0.get() + 1);
//!         Instant::from_ticks(self.0.get())
//!     }
//! }
//!
//! struct Relay(bool);
//! impl OutputPin for Relay {
//!     type Error = Infallible;
//!     fn set_low(&mut self) -> Result<(), Infallible> {
//!         self.0 = false;
//!         Ok(())
//!     }
//!     fn set_high(&mut self) -> Result<(), Infallible> {
//!         self.0 = true;
//!         Ok(())
//!     }
//! }
//!
//! let reader = SensorReader::new(RoomSensor, Uptime(Cell::new(0)));
//! let actuators = Actuators::new(Relay(false), Relay(false));
//! let mut thermostat = Thermostat::with_config(
//!     reader,
//!     actuators,
//!     Pinout { cooling: 4, heating: 5, sensor: 7 },
//!     ThermostatConfig { setpoint: 22.0, upper_threshold: 1.0, lower_threshold: 1.0 },
//! );
//!
//! // Tick at whatever cadence suits the platform.
//! let action = thermostat.handle()?;
//! assert_eq!(action, Action::Cooling);
//! # Ok::<(), core::convert::Infallible>(())
//! ```

pub mod actuator;
pub mod clock;
pub mod controller;
pub mod onewire;
pub mod sensor;

pub use actuator::{Action, Actuators};
pub use clock::{Clock, Duration, Instant};
pub use controller::{
    Pinout, Thermostat, ThermostatConfig, OPERATION_UNSUPPORTED, SENSOR_UNREADABLE,
};
pub use sensor::{
    dht::DhtSensor, ds18b20::Ds18b20Sensor, Probe, Reading, Sample, SensorError, SensorKind,
    SensorReader, MIN_READ_INTERVAL,
};
