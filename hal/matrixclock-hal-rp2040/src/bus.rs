//! Blocking SPI and I2C adapters
//!
//! The display push and IMU reads are short, bounded transfers made from
//! the control loop, so the blocking embassy-rp drivers are used.

use embassy_rp::i2c::{self, I2c};
use embassy_rp::spi::{self, Spi};
use embassy_rp::Peri;
use matrixclock_hal::i2c::I2cConfig;
use matrixclock_hal::spi::{Phase, Polarity, SpiConfig};

/// Convert a shared SPI configuration to the embassy-rp one
pub fn spi_config(config: SpiConfig) -> spi::Config {
    let (polarity, phase): (Polarity, Phase) = config.mode.into();
    let mut out = spi::Config::default();
    out.frequency = config.frequency;
    out.polarity = match polarity {
        Polarity::IdleLow => spi::Polarity::IdleLow,
        Polarity::IdleHigh => spi::Polarity::IdleHigh,
    };
    out.phase = match phase {
        Phase::CaptureOnFirstTransition => spi::Phase::CaptureOnFirstTransition,
        Phase::CaptureOnSecondTransition => spi::Phase::CaptureOnSecondTransition,
    };
    out
}

/// Convert a shared I2C configuration to the embassy-rp one
pub fn i2c_config(config: I2cConfig) -> i2c::Config {
    let mut out = i2c::Config::default();
    out.frequency = config.frequency;
    out
}

/// Transmit-only blocking SPI
pub struct BlockingSpi<'d, T: spi::Instance> {
    spi: Spi<'d, T, spi::Blocking>,
}

impl<'d, T: spi::Instance> BlockingSpi<'d, T> {
    /// Create a TX-only SPI master on the given clock/MOSI pins
    pub fn new(
        inner: Peri<'d, T>,
        clk: Peri<'d, impl spi::ClkPin<T> + 'd>,
        mosi: Peri<'d, impl spi::MosiPin<T> + 'd>,
        config: SpiConfig,
    ) -> Self {
        Self {
            spi: Spi::new_blocking_txonly(inner, clk, mosi, spi_config(config)),
        }
    }
}

impl<T: spi::Instance> matrixclock_hal::SpiBus for BlockingSpi<'_, T> {
    type Error = spi::Error;

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.spi.blocking_write(data)
    }
}

/// Blocking I2C master
pub struct BlockingI2c<'d, T: i2c::Instance> {
    i2c: I2c<'d, T, i2c::Blocking>,
}

impl<'d, T: i2c::Instance> BlockingI2c<'d, T> {
    /// Create a blocking I2C master on the given SCL/SDA pins
    pub fn new(
        inner: Peri<'d, T>,
        scl: Peri<'d, impl i2c::SclPin<T>>,
        sda: Peri<'d, impl i2c::SdaPin<T>>,
        config: I2cConfig,
    ) -> Self {
        Self {
            i2c: I2c::new_blocking(inner, scl, sda, i2c_config(config)),
        }
    }
}

impl<T: i2c::Instance> matrixclock_hal::I2cBus for BlockingI2c<'_, T> {
    type Error = i2c::Error;

    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        self.i2c.blocking_write(address, data)
    }

    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.i2c.blocking_write_read(address, write_data, read_buf)
    }
}
