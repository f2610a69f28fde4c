//! DS18B20 digital thermometer on a 1-Wire bus.

use embedded_hal::{
    blocking::delay::{DelayMs, DelayUs},
    digital::v2::{InputPin, OutputPin},
};
use fixed::types::I28F4;

use super::{Probe, Sample, SensorError, SensorKind};
use crate::onewire::{crc::check_crc8, Address, Error, OneWire};

/// First ROM byte of every DS18B20.
pub const FAMILY_CODE: u8 = 0x28;

pub const CONVERT_T: u8 = 0x44;
pub const READ_SCRATCHPAD: u8 = 0xBE;
pub const WRITE_SCRATCHPAD: u8 = 0x4E;

/// A DS18B20 reached through a [`OneWire`] bus.
///
/// The bus is searched on every transaction and the first device answering
/// is used, so a sensor can be hot-swapped between reads. A missing device,
/// a corrupt ROM address, or a foreign family code all surface as
/// [`SensorError::Unreadable`].
pub struct Ds18b20Sensor<P, D> {
    wire: OneWire<P>,
    delay: D,
    resolution: Resolution,
}

impl<E, P, D> Ds18b20Sensor<P, D>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
    D: DelayUs<u32> + DelayMs<u16>,
{
    pub fn new(wire: OneWire<P>, delay: D) -> Self {
        Self {
            wire,
            delay,
            resolution: Resolution::Bits12,
        }
    }

    pub fn wire(&self) -> &OneWire<P> {
        &self.wire
    }
    pub fn wire_mut(&mut self) -> &mut OneWire<P> {
        &mut self.wire
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Rewrites the configuration register of the attached sensor.
    ///
    /// Lower resolutions convert faster. The temperature decode scale is
    /// unaffected; only the undefined low bits change.
    pub fn set_resolution(&mut self, resolution: Resolution) -> Result<(), Error<E>> {
        let addr = self.find_device()?;
        let buf = self.read_scratchpad(&addr)?;

        // TH and TL alarm registers are kept, only the config byte changes.
        self.wire
            .send_command(Some(&addr), WRITE_SCRATCHPAD, &mut self.delay)?;
        self.wire.write_bytes(
            &[buf[2], buf[3], resolution.to_config_register()],
            &mut self.delay,
        )?;
        self.wire.reset(&mut self.delay)?;

        self.resolution = resolution;
        Ok(())
    }

    fn find_device(&mut self) -> Result<Address, Error<E>> {
        let found = self.wire.devices(&mut self.delay).next();
        let addr = match found {
            Some(addr) => addr?,
            None => return Err(Error::NoDevice),
        };
        validate_address(addr)?;
        Ok(addr)
    }

    fn read_scratchpad(&mut self, addr: &Address) -> Result<[u8; 9], Error<E>> {
        self.wire
            .send_command(Some(addr), READ_SCRATCHPAD, &mut self.delay)?;

        let mut buf = [0u8; 9];
        self.wire.read_bytes(&mut buf, &mut self.delay)?;

        check_crc8(&buf)?;

        Ok(buf)
    }

    fn measure(&mut self) -> Result<f32, Error<E>> {
        let addr = self.find_device()?;

        self.wire
            .send_command(Some(&addr), CONVERT_T, &mut self.delay)?;
        self.delay.delay_ms(self.resolution.conversion_time());

        let mut buf = self.read_scratchpad(&addr)?;

        let resolution =
            Resolution::from_config_register(buf[4]).ok_or(Error::UnexpectedResponse)?;

        // Zero the bits the configured resolution leaves undefined.
        match resolution {
            Resolution::Bits9 => buf[0] &= 0b1111_1000,
            Resolution::Bits10 => buf[0] &= 0b1111_1100,
            Resolution::Bits11 => buf[0] &= 0b1111_1110,
            Resolution::Bits12 => {}
        }

        Ok(raw_to_celsius(buf[0], buf[1]))
    }
}

impl<E, P, D> Probe for Ds18b20Sensor<P, D>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
    D: DelayUs<u32> + DelayMs<u16>,
{
    fn kind(&self) -> SensorKind {
        SensorKind::Ds18b20
    }

    fn sample(&mut self) -> Result<Sample, SensorError> {
        let temperature = self.measure().map_err(|_| SensorError::Unreadable)?;
        Ok(Sample {
            temperature,
            humidity: None,
        })
    }
}

/// Reject addresses with a bad ROM CRC or a family code of another device.
fn validate_address<E>(addr: Address) -> Result<(), Error<E>> {
    check_crc8(&addr.rom_bytes())?;
    if addr.family_code() != FAMILY_CODE {
        return Err(Error::FamilyCodeMismatch);
    }
    Ok(())
}

/// Convert the scratchpad temperature word to °C.
///
/// The word is a little-endian signed 16-bit value with the LSB worth
/// 1/16 °C at every resolution.
fn raw_to_celsius(lo: u8, hi: u8) -> f32 {
    let raw = i16::from_le_bytes([lo, hi]);
    I28F4::from_bits(i32::from(raw)).to_num::<f32>()
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    Bits9,
    Bits10,
    Bits11,
    Bits12,
}

impl Resolution {
    fn from_config_register(reg: u8) -> Option<Resolution> {
        match reg {
            0b0001_1111 => Some(Resolution::Bits9),
            0b0011_1111 => Some(Resolution::Bits10),
            0b0101_1111 => Some(Resolution::Bits11),
            0b0111_1111 => Some(Resolution::Bits12),
            _ => None,
        }
    }

    pub fn to_config_register(self) -> u8 {
        match self {
            Resolution::Bits9 => 0b0001_1111,
            Resolution::Bits10 => 0b0011_1111,
            Resolution::Bits11 => 0b0101_1111,
            Resolution::Bits12 => 0b0111_1111,
        }
    }

    /// Returns the minimum conversion time in milliseconds
    pub fn conversion_time(self) -> u16 {
        match self {
            Resolution::Bits9 => 94,
            Resolution::Bits10 => 188,
            Resolution::Bits11 => 375,
            Resolution::Bits12 => 750,
        }
    }
}
