//! SPI bus abstractions
//!
//! The MAX7219 chain is write-only: 16-bit frames shifted MSB first,
//! latched on the rising edge of chip select.

/// SPI bus master (transmit side)
pub trait SpiBus {
    /// Error type for SPI operations
    type Error;

    /// Write data without reading
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;
}

/// SPI configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiConfig {
    /// Clock frequency in Hz
    pub frequency: u32,
    /// Clock polarity and phase
    pub mode: Mode,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            frequency: 1_000_000, // 1 MHz
            mode: Mode::Mode0,
        }
    }
}

impl SpiConfig {
    /// MAX7219: up to 10 MHz, data sampled on the rising clock edge
    pub const MAX7219: Self = Self {
        frequency: 8_000_000,
        mode: Mode::Mode0,
    };
}

/// SPI clock polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Clock idles low (CPOL=0)
    IdleLow,
    /// Clock idles high (CPOL=1)
    IdleHigh,
}

/// SPI clock phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Data captured on first clock transition (CPHA=0)
    CaptureOnFirstTransition,
    /// Data captured on second clock transition (CPHA=1)
    CaptureOnSecondTransition,
}

/// SPI mode (combined polarity and phase)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Mode 0: CPOL=0, CPHA=0
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

impl From<Mode> for (Polarity, Phase) {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Mode0 => (Polarity::IdleLow, Phase::CaptureOnFirstTransition),
            Mode::Mode1 => (Polarity::IdleLow, Phase::CaptureOnSecondTransition),
            Mode::Mode2 => (Polarity::IdleHigh, Phase::CaptureOnFirstTransition),
            Mode::Mode3 => (Polarity::IdleHigh, Phase::CaptureOnSecondTransition),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_split() {
        let (polarity, phase): (Polarity, Phase) = Mode::Mode3.into();
        assert_eq!(polarity, Polarity::IdleHigh);
        assert_eq!(phase, Phase::CaptureOnSecondTransition);
    }

    #[test]
    fn test_max7219_config_is_mode0() {
        let (polarity, phase): (Polarity, Phase) = SpiConfig::MAX7219.mode.into();
        assert_eq!(polarity, Polarity::IdleLow);
        assert_eq!(phase, Phase::CaptureOnFirstTransition);
        assert!(SpiConfig::MAX7219.frequency <= 10_000_000);
    }
}
