//! Debounced push button
//!
//! The button pulls its pin to ground; the internal pull-up holds it high
//! otherwise. A level change is accepted immediately and further changes
//! are ignored for [`DEBOUNCE_MS`], so contact bounce after an edge never
//! produces a second press.

use matrixclock_core::traits::ButtonInput;
use matrixclock_hal::InputPin;

/// Lock-out after an accepted level change
pub const DEBOUNCE_MS: u64 = 100;

/// Active-low button with edge detection
pub struct Button<P> {
    pin: P,
    pressed: bool,
    ignore_until_ms: u64,
    changed: bool,
}

impl<P: InputPin> Button<P> {
    pub fn new(pin: P) -> Self {
        let pressed = pin.is_low();
        Self {
            pin,
            pressed,
            ignore_until_ms: 0,
            changed: false,
        }
    }

    /// Debounced level: true while held down
    pub fn read(&mut self, now_ms: u64) -> bool {
        if now_ms >= self.ignore_until_ms {
            let level = self.pin.is_low();
            if level != self.pressed {
                self.pressed = level;
                self.changed = true;
                self.ignore_until_ms = now_ms + DEBOUNCE_MS;
            }
        }
        self.pressed
    }

    fn has_changed(&mut self) -> bool {
        core::mem::take(&mut self.changed)
    }

    /// True once per press
    pub fn was_pressed(&mut self, now_ms: u64) -> bool {
        self.read(now_ms) && self.has_changed()
    }

    /// True once per release
    pub fn was_released(&mut self, now_ms: u64) -> bool {
        !self.read(now_ms) && self.has_changed()
    }
}

impl<P: InputPin> ButtonInput for Button<P> {
    fn pressed(&mut self, now_ms: u64) -> bool {
        self.was_pressed(now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct FakePin<'a>(&'a Cell<bool>);

    impl InputPin for FakePin<'_> {
        fn is_high(&self) -> bool {
            self.0.get()
        }
    }

    #[test]
    fn test_single_press_reported_once() {
        let level = Cell::new(true);
        let mut button = Button::new(FakePin(&level));
        assert!(!button.pressed(0));

        level.set(false);
        assert!(button.pressed(10));
        assert!(!button.pressed(20));
        assert!(!button.pressed(500));
    }

    #[test]
    fn test_bounce_is_ignored() {
        let level = Cell::new(true);
        let mut button = Button::new(FakePin(&level));

        level.set(false);
        assert!(button.pressed(1000));
        // Contact bounce inside the lock-out window
        level.set(true);
        assert!(!button.pressed(1010));
        level.set(false);
        assert!(!button.pressed(1020));
        level.set(true);
        assert!(!button.pressed(1050));

        // Released after the window, then pressed again
        assert!(button.was_released(1150));
        level.set(false);
        assert!(button.pressed(1300));
    }

    #[test]
    fn test_held_at_boot_is_not_a_press() {
        let level = Cell::new(false);
        let mut button = Button::new(FakePin(&level));
        assert!(!button.pressed(0));
        assert!(button.read(0));
    }
}
