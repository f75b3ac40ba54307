//! GPIO wrappers
//!
//! Newtypes so embassy-rp pins can implement the shared pin traits.

use embassy_rp::gpio::{Input, Output};

/// Push-pull output implementing [`matrixclock_hal::OutputPin`]
pub struct GpioOutput<'d>(Output<'d>);

impl<'d> GpioOutput<'d> {
    pub fn new(pin: Output<'d>) -> Self {
        Self(pin)
    }
}

impl matrixclock_hal::OutputPin for GpioOutput<'_> {
    fn set_high(&mut self) {
        self.0.set_high();
    }

    fn set_low(&mut self) {
        self.0.set_low();
    }
}

/// Input implementing [`matrixclock_hal::InputPin`]
pub struct GpioInput<'d>(Input<'d>);

impl<'d> GpioInput<'d> {
    pub fn new(pin: Input<'d>) -> Self {
        Self(pin)
    }
}

impl matrixclock_hal::InputPin for GpioInput<'_> {
    fn is_high(&self) -> bool {
        self.0.is_high()
    }
}
