//! Dallas/Maxim CRC-8, used for ROM addresses and the DS18B20 scratchpad.

use super::Error;

/// Computes the CRC-8 of `data` with the reflected polynomial `0x8C` (X^8 + X^5 + X^4 + 1).
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;

    for byte in data {
        let mut byte = *byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            byte >>= 1;
        }
    }

    crc
}

/// Checks that the last byte of `data` is the CRC-8 of the bytes before it.
pub fn check_crc8<E>(data: &[u8]) -> Result<(), Error<E>> {
    let (payload, crc) = data.split_at(data.len() - 1);
    if crc8(payload) == crc[0] {
        Ok(())
    } else {
        Err(Error::CrcMismatch)
    }
}
