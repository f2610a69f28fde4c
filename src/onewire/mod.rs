//! Bit-banged 1-Wire bus over a single open-drain pin.
//!
//! The pin must be wired open-drain with an external pull-up so the idle
//! state is high. Timeslot timing follows the Maxim application notes; the
//! caller is responsible for masking interrupts if the platform cannot
//! otherwise guarantee microsecond-accurate delays.

mod address;
pub mod commands;
pub mod crc;
mod error;

use embedded_hal::{
    blocking::delay::DelayUs,
    digital::v2::{InputPin, OutputPin},
};

pub use self::{address::Address, error::*};

pub struct OneWire<P> {
    pin: P,
}

impl<E, P> OneWire<P>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
{
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    /// Releases the bus pin.
    pub fn release(self) -> P {
        self.pin
    }

    /// Perform a reset initialization sequence
    pub fn reset(&mut self, delay: &mut impl DelayUs<u32>) -> Result<(), E> {
        // Wait for the bus to be pulled high by the pull-up resistor
        let mut retries = 125;
        while self.pin.is_low()? {
            if retries == 0 {
                return Err(Error::BusNotHigh);
            }
            retries -= 1;
            delay.delay_us(2);
        }

        // Pull the bus low for 480us
        self.pin.set_low()?;
        delay.delay_us(480);

        // Release the bus
        self.pin.set_high()?;
        delay.delay_us(70);

        // A present device answers with a 60-240us presence pulse
        let is_low = self.pin.is_low()?;
        delay.delay_us(410);

        if is_low {
            Ok(())
        } else {
            Err(Error::UnexpectedResponse)
        }
    }

    /// Write a single bit to the bus
    pub fn write_bit(&mut self, bit: bool, delay: &mut impl DelayUs<u32>) -> Result<(), E> {
        if bit {
            // Pull the bus low for 10us
            self.pin.set_low()?;
            delay.delay_us(10);

            // Release the bus
            self.pin.set_high()?;

            // Wait for the end of the timeslot
            delay.delay_us(55);
        } else {
            // Pull the bus low for 65us
            self.pin.set_low()?;
            delay.delay_us(65);

            // Release the bus
            self.pin.set_high()?;

            // Wait for the end of the timeslot
            delay.delay_us(5);
        }

        Ok(())
    }

    /// Read a single bit from the bus
    pub fn read_bit(&mut self, delay: &mut impl DelayUs<u32>) -> Result<bool, E> {
        // Pull the bus low to open the read slot
        self.pin.set_low()?;
        delay.delay_us(2);

        // Release the bus and let the device drive it
        self.pin.set_high()?;
        delay.delay_us(10);

        // Sample within 15us of the slot start
        let ret = self.pin.is_high()?;

        // Wait for the end of the timeslot
        delay.delay_us(50);

        Ok(ret)
    }

    /// Write a single byte to the bus
    pub fn write_byte(&mut self, byte: u8, delay: &mut impl DelayUs<u32>) -> Result<(), E> {
        for i in 0..8 {
            self.write_bit((byte >> i) & 1 == 1, delay)?;
        }
        Ok(())
    }

    /// Write multiple bytes to the bus
    pub fn write_bytes(&mut self, bytes: &[u8], delay: &mut impl DelayUs<u32>) -> Result<(), E> {
        for byte in bytes {
            self.write_byte(*byte, delay)?;
        }
        Ok(())
    }

    /// Read a single byte from the bus
    pub fn read_byte(&mut self, delay: &mut impl DelayUs<u32>) -> Result<u8, E> {
        let mut ret = 0;
        for i in 0..8 {
            if self.read_bit(delay)? {
                ret |= 1 << i;
            }
        }
        Ok(ret)
    }

    /// Read multiple bytes from the bus
    pub fn read_bytes(&mut self, bytes: &mut [u8], delay: &mut impl DelayUs<u32>) -> Result<(), E> {
        for byte in bytes {
            *byte = self.read_byte(delay)?;
        }
        Ok(())
    }

    /// Do a ROM select
    pub fn select_address(
        &mut self,
        device: &Address,
        delay: &mut impl DelayUs<u32>,
    ) -> Result<(), E> {
        self.write_byte(commands::MATCH_ROM, delay)?;
        self.write_bytes(&device.rom_bytes(), delay)
    }

    /// Do a ROM skip
    pub fn skip_address(&mut self, delay: &mut impl DelayUs<u32>) -> Result<(), E> {
        self.write_byte(commands::SKIP_ROM, delay)
    }

    /// Get iterator over all devices on the bus
    pub fn devices<'a, 'd, D: DelayUs<u32>>(
        &'a mut self,
        delay: &'d mut D,
    ) -> DeviceSearch<'a, 'd, P, D> {
        DeviceSearch {
            wire: self,
            last_discrepancy: 0,
            last_device_flag: false,
            rom_no: [0; 8],
            delay,
        }
    }

    /// Send a command to the bus
    ///
    /// Does the following sequence:
    /// 1. Reset the bus
    /// 2. Select the given address, or skip if None
    /// 3. Write the command byte
    pub fn send_command(
        &mut self,
        address: Option<&Address>,
        command: u8,
        delay: &mut impl DelayUs<u32>,
    ) -> Result<(), E> {
        self.reset(delay)?;
        if let Some(address) = address {
            self.select_address(address, delay)?;
        } else {
            self.skip_address(delay)?;
        }
        self.write_byte(command, delay)?;
        Ok(())
    }
}

/// Iterator over ROM addresses discovered on the bus, per the Maxim search
/// algorithm (application note 187).
pub struct DeviceSearch<'a, 'd, P, D> {
    wire: &'a mut OneWire<P>,
    last_discrepancy: u8,
    last_device_flag: bool,
    rom_no: [u8; 8],
    delay: &'d mut D,
}

impl<E, P, D> DeviceSearch<'_, '_, P, D>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
    D: DelayUs<u32>,
{
    pub fn search(&mut self) -> Result<Option<Address>, E> {
        let mut id_bit_number = 1u8;
        let mut last_zero = 0u8;
        let mut rom_byte_number = 0u8;
        let mut rom_byte_mask = 1u8;
        let mut search_result = false;

        if !self.last_device_flag {
            self.wire.reset(self.delay)?;

            self.wire.write_byte(commands::SEARCH_NORMAL, self.delay)?;

            while rom_byte_number < 8 {
                let id_bit = self.wire.read_bit(self.delay)?;
                let cmp_id_bit = self.wire.read_bit(self.delay)?;

                // Both high: no device answered this bit position
                if id_bit && cmp_id_bit {
                    break;
                }

                let search_direction = if id_bit != cmp_id_bit {
                    // All coupled devices agree on this bit
                    id_bit
                } else {
                    // Discrepancy: retrace the previous path up to the last
                    // discrepancy, then branch towards 1
                    let sd = if id_bit_number < self.last_discrepancy {
                        (self.rom_no[rom_byte_number as usize] & rom_byte_mask) > 0
                    } else {
                        id_bit_number == self.last_discrepancy
                    };

                    if !sd {
                        last_zero = id_bit_number;
                    }

                    sd
                };

                if search_direction {
                    self.rom_no[rom_byte_number as usize] |= rom_byte_mask;
                } else {
                    self.rom_no[rom_byte_number as usize] &= !rom_byte_mask;
                }

                self.wire.write_bit(search_direction, self.delay)?;

                id_bit_number += 1;
                rom_byte_mask <<= 1;

                if rom_byte_mask == 0 {
                    rom_byte_number += 1;
                    rom_byte_mask = 1;
                }
            }

            if id_bit_number >= 65 {
                // All 64 bits resolved
                self.last_discrepancy = last_zero;

                if self.last_discrepancy == 0 {
                    self.last_device_flag = true;
                }
                search_result = true;
            }
        }

        if !search_result || self.rom_no[0] == 0 {
            self.last_discrepancy = 0;
            self.last_device_flag = false;
            Ok(None)
        } else {
            let address = Address(u64::from_le_bytes(self.rom_no));
            Ok(Some(address))
        }
    }
}

impl<E, P, D> Iterator for DeviceSearch<'_, '_, P, D>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
    D: DelayUs<u32>,
{
    type Item = Result<Address, E>;

    fn next(&mut self) -> Option<Self::Item> {
        self.search().transpose()
    }
}
