//! RP2040-specific HAL for the matrix clock firmware
//!
//! This crate provides RP2040 implementations of the shared
//! `matrixclock-hal` traits:
//!
//! - GPIO wrappers for the tile chip-select and the push button
//! - Blocking SPI/I2C adapters for the MAX7219 chain and the IMU
//! - Flash storage driver (implements `matrixclock_hal::FlashStorage`)
//!   that doubles as the `NorFlash` the firmware updater writes through

#![no_std]

pub mod bus;
pub mod flash;
pub mod gpio;

// Re-export shared traits from matrixclock-hal for convenience
pub use matrixclock_hal::{FlashStorage as FlashStorageTrait, StorageKey};
