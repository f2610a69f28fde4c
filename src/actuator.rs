//! Binary cooling/heating output lines.

use embedded_hal::digital::v2::OutputPin;

/// Actuator decision for one control tick.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Energize the cooling line, heating off.
    Cooling,
    /// Energize the heating line, cooling off.
    Heating,
    /// Both lines off.
    Idle,
    /// Leave both lines exactly as the previous tick left them.
    Hold,
}

/// The cooling/heating pin pair, driven as a unit.
pub struct Actuators<C, H> {
    cooling: C,
    heating: H,
}

impl<E, C, H> Actuators<C, H>
where
    C: OutputPin<Error = E>,
    H: OutputPin<Error = E>,
{
    pub fn new(cooling: C, heating: H) -> Self {
        Self { cooling, heating }
    }

    /// Apply a tick decision to the lines.
    ///
    /// The opposing line is always released before the active one is
    /// energized, so both are never on together. [`Action::Hold`] writes
    /// nothing.
    pub fn apply(&mut self, action: Action) -> Result<(), E> {
        match action {
            Action::Cooling => {
                self.heating.set_low()?;
                self.cooling.set_high()
            }
            Action::Heating => {
                self.cooling.set_low()?;
                self.heating.set_high()
            }
            Action::Idle => {
                self.cooling.set_low()?;
                self.heating.set_low()
            }
            Action::Hold => Ok(()),
        }
    }

    /// Releases both pins.
    pub fn release(self) -> (C, H) {
        (self.cooling, self.heating)
    }
}
