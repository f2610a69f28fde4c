pub type Result<T, E> = core::result::Result<T, Error<E>>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The bus was expected to be pulled high by a ~5K ohm pull-up resistor, but it wasn't
    BusNotHigh,

    /// Pin Error
    Pin(E),

    /// An unexpected response was received from a command. This generally happens when a sensor is
    /// added or removed from the bus during a command, such as a device search.
    UnexpectedResponse,

    /// A ROM search finished without finding any device
    NoDevice,

    FamilyCodeMismatch,
    CrcMismatch,
}

impl<E> Error<E> {
    pub fn as_str(&self) -> &'static str {
        match self {
            Error::BusNotHigh => "Bus not high",
            Error::Pin(_) => "Pin error",
            Error::UnexpectedResponse => "Unexpected response",
            Error::NoDevice => "No device",
            Error::FamilyCodeMismatch => "Family code mismatch",
            Error::CrcMismatch => "CRC mismatch",
        }
    }
}

impl<E> From<E> for Error<E> {
    fn from(value: E) -> Self {
        Self::Pin(value)
    }
}
