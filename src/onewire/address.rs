/// A 64-bit ROM address of a device. These are globally unique, and used to single out a single
/// device on a potentially crowded bus.
///
/// Layout (little-endian): family code, 48-bit serial, CRC-8 of the preceding 7 bytes.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Address(pub u64);

impl Address {
    pub const fn family_code(self) -> u8 {
        self.0.to_le_bytes()[0]
    }

    /// The address as it appears on the wire, LSB (family code) first.
    pub const fn rom_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }
}

impl core::fmt::Debug for Address {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
        write!(f, "{:016X?}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Address {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(f, "{=u64:016X}", self.0);
    }
}
