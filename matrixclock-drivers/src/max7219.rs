//! MAX7219 LED matrix chain
//!
//! Four MAX7219 tiles share DIN/CLK/CS in a daisy chain. Every command is
//! a 16-bit frame (register, data); frames for the whole chain are shifted
//! out back to back under one chip-select pulse and latched together on
//! the rising edge of CS. The first tile in the chain (DIN wired to the
//! MCU) receives the frame that is shifted out last.

use matrixclock_display::{DisplayError, MatrixPanel, TileRows, TILE_COUNT};
use matrixclock_hal::{OutputPin, SpiBus};

/// MAX7219 register addresses
pub mod reg {
    /// No-op, used to skip a tile in the chain
    pub const NOOP: u8 = 0x00;
    /// First digit (row) register; digits are 0x01..=0x08
    pub const DIGIT0: u8 = 0x01;
    /// BCD decode enable per digit
    pub const DECODE_MODE: u8 = 0x09;
    /// Brightness 0..=15
    pub const INTENSITY: u8 = 0x0A;
    /// Number of scanned digits minus one
    pub const SCAN_LIMIT: u8 = 0x0B;
    /// 0 = shutdown, 1 = normal operation
    pub const SHUTDOWN: u8 = 0x0C;
    /// 1 = all LEDs on
    pub const DISPLAY_TEST: u8 = 0x0F;
}

/// Highest accepted intensity value
pub const MAX_INTENSITY: u8 = 15;

/// Digit registers per tile
pub const DIGITS: usize = 8;

/// Errors from the LED chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Max7219Error {
    /// SPI transfer failed
    Bus,
    /// Intensity above 15
    InvalidIntensity,
}

impl From<Max7219Error> for DisplayError {
    fn from(e: Max7219Error) -> Self {
        match e {
            Max7219Error::Bus => DisplayError::Communication,
            Max7219Error::InvalidIntensity => DisplayError::InvalidIntensity,
        }
    }
}

/// A chain of [`TILE_COUNT`] MAX7219 tiles
pub struct Max7219<SPI, CS> {
    spi: SPI,
    cs: CS,
}

impl<SPI: SpiBus, CS: OutputPin> Max7219<SPI, CS> {
    /// Take the bus and chip-select; call [`Self::init`] before use
    pub fn new(spi: SPI, mut cs: CS) -> Self {
        cs.set_high();
        Self { spi, cs }
    }

    /// Bring every tile out of shutdown with a blank, raw-mode display
    pub fn init(&mut self, intensity: u8) -> Result<(), Max7219Error> {
        self.broadcast(reg::DISPLAY_TEST, 0)?;
        self.broadcast(reg::SCAN_LIMIT, (DIGITS - 1) as u8)?;
        self.broadcast(reg::DECODE_MODE, 0)?;
        self.clear()?;
        self.set_brightness(intensity)?;
        self.broadcast(reg::SHUTDOWN, 1)
    }

    /// Blank all digits
    pub fn clear(&mut self) -> Result<(), Max7219Error> {
        for digit in 0..DIGITS as u8 {
            self.broadcast(reg::DIGIT0 + digit, 0)?;
        }
        Ok(())
    }

    pub fn set_brightness(&mut self, intensity: u8) -> Result<(), Max7219Error> {
        if intensity > MAX_INTENSITY {
            return Err(Max7219Error::InvalidIntensity);
        }
        self.broadcast(reg::INTENSITY, intensity)
    }

    /// Enter or leave low-power shutdown
    pub fn shutdown(&mut self, off: bool) -> Result<(), Max7219Error> {
        self.broadcast(reg::SHUTDOWN, if off { 0 } else { 1 })
    }

    /// Write the same register on every tile
    pub fn broadcast(&mut self, register: u8, data: u8) -> Result<(), Max7219Error> {
        self.transfer(&[(register, data); TILE_COUNT])
    }

    /// Shift one frame per tile; `frames[0]` goes to the first tile
    pub fn transfer(&mut self, frames: &[(u8, u8); TILE_COUNT]) -> Result<(), Max7219Error> {
        let mut buf = [0u8; 2 * TILE_COUNT];
        for (slot, &(register, data)) in buf.chunks_exact_mut(2).zip(frames.iter().rev()) {
            slot[0] = register;
            slot[1] = data;
        }

        self.cs.set_low();
        let result = self.spi.write(&buf).map_err(|_| Max7219Error::Bus);
        self.cs.set_high();
        result
    }

    pub fn release(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }
}

impl<SPI: SpiBus, CS: OutputPin> MatrixPanel for Max7219<SPI, CS> {
    fn write(&mut self, rows: &TileRows) -> Result<(), DisplayError> {
        for digit in 0..DIGITS {
            let mut frames = [(reg::NOOP, 0u8); TILE_COUNT];
            for (frame, tile) in frames.iter_mut().zip(rows.iter()) {
                *frame = (reg::DIGIT0 + digit as u8, tile[digit]);
            }
            self.transfer(&frames)?;
        }
        Ok(())
    }

    fn set_intensity(&mut self, level: u8) -> Result<(), DisplayError> {
        Ok(self.set_brightness(level)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;

    #[derive(Default)]
    struct RecordingSpi {
        bytes: Vec<u8, 512>,
        transfers: u32,
        fail: bool,
    }

    impl SpiBus for RecordingSpi {
        type Error = ();

        fn write(&mut self, data: &[u8]) -> Result<(), ()> {
            if self.fail {
                return Err(());
            }
            self.transfers += 1;
            self.bytes.extend_from_slice(data).map_err(|_| ())
        }
    }

    #[derive(Default)]
    struct FakeCs {
        high: bool,
        pulses: u32,
    }

    impl OutputPin for FakeCs {
        fn set_high(&mut self) {
            if !self.high {
                self.pulses += 1;
            }
            self.high = true;
        }

        fn set_low(&mut self) {
            self.high = false;
        }
    }

    fn chain() -> Max7219<RecordingSpi, FakeCs> {
        Max7219::new(RecordingSpi::default(), FakeCs::default())
    }

    #[test]
    fn test_frames_reach_first_tile_last() {
        let mut max = chain();
        max.transfer(&[(1, 0xA0), (2, 0xA1), (3, 0xA2), (4, 0xA3)]).unwrap();
        let (spi, cs) = max.release();
        assert_eq!(spi.bytes.as_slice(), &[4, 0xA3, 3, 0xA2, 2, 0xA1, 1, 0xA0]);
        assert!(cs.high);
    }

    #[test]
    fn test_init_sequence() {
        let mut max = chain();
        max.init(1).unwrap();
        let (spi, _) = max.release();
        // display test, scan limit, decode, 8 digits, intensity, shutdown
        assert_eq!(spi.transfers, 13);
        let first_registers: [u8; 3] = [spi.bytes[0], spi.bytes[8], spi.bytes[16]];
        assert_eq!(
            first_registers,
            [reg::DISPLAY_TEST, reg::SCAN_LIMIT, reg::DECODE_MODE]
        );
        assert_eq!(spi.bytes[9], 7);
        let tail = &spi.bytes[spi.bytes.len() - 16..];
        assert_eq!(&tail[..2], &[reg::INTENSITY, 1]);
        assert_eq!(&tail[8..10], &[reg::SHUTDOWN, 1]);
    }

    #[test]
    fn test_panel_write_sends_each_digit() {
        let mut max = chain();
        let mut rows: TileRows = [[0; 8]; TILE_COUNT];
        rows[0][0] = 0x11;
        rows[3][7] = 0x88;
        max.write(&rows).unwrap();
        let (spi, cs) = max.release();
        assert_eq!(spi.transfers, 8);
        assert_eq!(cs.pulses, 9);
        // digit 1: last frame in the burst is tile 0
        assert_eq!(&spi.bytes[6..8], &[reg::DIGIT0, 0x11]);
        // digit 8: first frame in the burst is tile 3
        assert_eq!(&spi.bytes[56..58], &[reg::DIGIT0 + 7, 0x88]);
    }

    #[test]
    fn test_intensity_range() {
        let mut max = chain();
        assert_eq!(
            MatrixPanel::set_intensity(&mut max, 16),
            Err(DisplayError::InvalidIntensity)
        );
        assert!(MatrixPanel::set_intensity(&mut max, 15).is_ok());
    }

    #[test]
    fn test_bus_error_releases_cs() {
        let mut max = chain();
        max.spi.fail = true;
        assert_eq!(max.broadcast(reg::SHUTDOWN, 1), Err(Max7219Error::Bus));
        assert!(max.cs.high);
    }
}
