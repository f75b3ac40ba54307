//! Matrixclock Hardware Abstraction Layer
//!
//! Bus-level traits implemented by chip-specific HALs. The clock's
//! device drivers (LED tiles, IMU, button) are written against these
//! traits so they can be exercised on the host with mock buses.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  matrixclock-drivers / matrixclock-firmware  │
//! └─────────────────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌─────────────────────────────────────────────┐
//! │  matrixclock-hal (this crate - traits)      │
//! └─────────────────────────────────────────────┘
//!                       │
//!                       ▼
//!           ┌───────────────────────┐
//!           │ matrixclock-hal-rp2040 │
//!           └───────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::OutputPin`], [`gpio::InputPin`] - Digital I/O
//! - [`i2c::I2cBus`] - I2C bus operations
//! - [`spi::SpiBus`] - SPI bus operations
//! - [`flash::FlashStorage`] - Persistent key/value storage

#![no_std]
#![deny(unsafe_code)]

pub mod flash;
pub mod gpio;
pub mod i2c;
pub mod spi;

// Re-export key traits at crate root for convenience
pub use flash::{FlashError, FlashStorage, StorageKey};
pub use gpio::{InputPin, OutputPin};
pub use i2c::I2cBus;
pub use spi::SpiBus;
