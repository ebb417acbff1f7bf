use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use esp_hal::gpio::Flex;

/// Open-drain emulation on a flexible pin with an external pull-up: driving
/// low enables the output, driving high releases the line
pub struct OpenDrainPin<'d> {
    pin: Flex<'d>,
}

impl<'d> OpenDrainPin<'d> {
    pub fn new(mut pin: Flex<'d>) -> Self {
        pin.set_low();
        pin.set_input_enable(true);
        pin.set_output_enable(false);
        Self { pin }
    }
}

impl ErrorType for OpenDrainPin<'_> {
    type Error = Infallible;
}

impl OutputPin for OpenDrainPin<'_> {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.pin.set_output_enable(true);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.pin.set_output_enable(false);
        Ok(())
    }
}

impl InputPin for OpenDrainPin<'_> {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.pin.is_high())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(self.pin.is_low())
    }
}
