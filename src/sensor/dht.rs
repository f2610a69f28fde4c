//! DHT11/DHT22 single-wire timed-pulse protocol.
//!
//! Both models share the wire format: the host holds the bus low to wake the
//! sensor, the sensor answers with an 80 µs low / 80 µs high preamble, then
//! clocks out 40 bits where the length of the high phase encodes the bit.
//! Only the wake-up time and the payload layout differ between the models.

use embedded_hal::{
    blocking::delay::{DelayMs, DelayUs},
    digital::v2::{InputPin, OutputPin},
};

use super::{Probe, Sample, SensorError, SensorKind};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Model {
    Dht11,
    Dht22,
}

impl Model {
    /// How long the bus must be held low to start a transaction.
    const fn wake_ms(self) -> u16 {
        match self {
            Model::Dht11 => 18,
            Model::Dht22 => 2,
        }
    }
}

/// A DHT11 or DHT22 on a single open-drain data pin with a pull-up.
pub struct DhtSensor<P, D> {
    pin: P,
    delay: D,
    model: Model,
}

impl<E, P, D> DhtSensor<P, D>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
    D: DelayUs<u32> + DelayMs<u16>,
{
    pub fn dht11(pin: P, delay: D) -> Self {
        Self {
            pin,
            delay,
            model: Model::Dht11,
        }
    }

    pub fn dht22(pin: P, delay: D) -> Self {
        Self {
            pin,
            delay,
            model: Model::Dht22,
        }
    }

    /// Releases the data pin.
    pub fn release(self) -> P {
        self.pin
    }

    fn read_raw(&mut self) -> Result<[u8; 5], SensorError> {
        // Start signal
        self.pin.set_low().map_err(|_| SensorError::Unreadable)?;
        self.delay.delay_ms(self.model.wake_ms());
        self.pin.set_high().map_err(|_| SensorError::Unreadable)?;
        self.delay.delay_us(40);

        // Sensor acknowledges with 80us low, 80us high
        self.wait_for(false, 100)?;
        self.wait_for(true, 100)?;
        self.wait_for(false, 100)?;

        let mut data = [0u8; 5];
        for byte in &mut data {
            for _ in 0..8 {
                *byte = (*byte << 1) | u8::from(self.read_bit()?);
            }
        }

        Ok(data)
    }

    fn read_bit(&mut self) -> Result<bool, SensorError> {
        // Every bit starts with a 50us low preamble; the high time encodes
        // the value (~27us for 0, ~70us for 1). Sample mid-way.
        self.wait_for(true, 100)?;
        self.delay.delay_us(35);
        let bit = self.pin.is_high().map_err(|_| SensorError::Unreadable)?;
        if bit {
            self.wait_for(false, 100)?;
        }
        Ok(bit)
    }

    fn wait_for(&mut self, level: bool, timeout_us: u32) -> Result<(), SensorError> {
        for _ in 0..timeout_us {
            let high = self.pin.is_high().map_err(|_| SensorError::Unreadable)?;
            if high == level {
                return Ok(());
            }
            self.delay.delay_us(1);
        }
        Err(SensorError::Unreadable)
    }
}

impl<E, P, D> Probe for DhtSensor<P, D>
where
    P: InputPin<Error = E> + OutputPin<Error = E>,
    D: DelayUs<u32> + DelayMs<u16>,
{
    fn kind(&self) -> SensorKind {
        match self.model {
            Model::Dht11 => SensorKind::Dht11,
            Model::Dht22 => SensorKind::Dht22,
        }
    }

    fn sample(&mut self) -> Result<Sample, SensorError> {
        let data = self.read_raw()?;
        decode(self.model, data)
    }
}

/// Decode a checked 5-byte payload into a sample.
fn decode(model: Model, data: [u8; 5]) -> Result<Sample, SensorError> {
    let sum = data[0]
        .wrapping_add(data[1])
        .wrapping_add(data[2])
        .wrapping_add(data[3]);
    if sum != data[4] {
        return Err(SensorError::Unreadable);
    }

    let (temperature, humidity) = match model {
        // Integral-degree payload; the fractional bytes are always zero.
        Model::Dht11 => (f32::from(data[2]), f32::from(data[0])),
        // Tenths of a unit, big-endian; the temperature sign lives in the
        // top bit rather than two's complement.
        Model::Dht22 => {
            let raw_humidity = u16::from_be_bytes([data[0], data[1]]);
            let raw_temperature = u16::from_be_bytes([data[2] & 0x7F, data[3]]);
            let temperature = f32::from(raw_temperature) / 10.0;
            (
                if data[2] & 0x80 != 0 {
                    -temperature
                } else {
                    temperature
                },
                f32::from(raw_humidity) / 10.0,
            )
        }
    };

    Ok(Sample {
        temperature,
        humidity: Some(humidity),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dht11_integral_payload() {
        let sample = decode(Model::Dht11, [0x37, 0x00, 0x17, 0x00, 0x4E]).unwrap();
        assert_eq!(sample.temperature, 23.0);
        assert_eq!(sample.humidity, Some(55.0));
    }

    #[test]
    fn dht22_tenths_payload() {
        // 65.2 %RH, 35.1 °C
        let sample = decode(Model::Dht22, [0x02, 0x8C, 0x01, 0x5F, 0xEE]).unwrap();
        assert_eq!(sample.temperature, 35.1);
        assert_eq!(sample.humidity, Some(65.2));
    }

    #[test]
    fn dht22_negative_temperature() {
        // Sign bit set: -10.1 °C
        let sample = decode(Model::Dht22, [0x02, 0x8C, 0x80, 0x65, 0x73]).unwrap();
        assert_eq!(sample.temperature, -10.1);
    }

    #[test]
    fn checksum_mismatch_is_unreadable() {
        assert_eq!(
            decode(Model::Dht22, [0x02, 0x8C, 0x01, 0x5F, 0xEF]),
            Err(SensorError::Unreadable)
        );
    }

    #[test]
    fn wake_times_differ_per_model() {
        assert_eq!(Model::Dht11.wake_ms(), 18);
        assert_eq!(Model::Dht22.wake_ms(), 2);
    }
}
