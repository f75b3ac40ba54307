//! Hardware driver implementations
//!
//! Concrete implementations of the clock's device traits, written against
//! the bus traits of `matrixclock-hal`:
//!
//! - [`max7219`]: the daisy-chained LED tiles ([`matrixclock_display::MatrixPanel`])
//! - [`imu`]: MPU6050 tilt angle ([`matrixclock_core::traits::AngleSensor`])
//! - [`button`]: debounced push button ([`matrixclock_core::traits::ButtonInput`])

#![no_std]
#![deny(unsafe_code)]

pub mod button;
pub mod imu;
pub mod max7219;
