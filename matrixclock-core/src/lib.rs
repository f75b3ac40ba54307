//! Board-agnostic logic of the matrix clock
//!
//! Everything here runs on the host as well as on the device. Hardware
//! and network stacks are reached only through the traits in [`traits`];
//! the firmware crate supplies the implementations and drives
//! [`control::Devices::run_once`] from its main task.

#![no_std]
#![deny(unsafe_code)]

pub mod config;
pub mod control;
pub mod net;
pub mod ota;
pub mod sensor;
pub mod time;
pub mod traits;
pub mod web;

pub use config::ClockConfig;
pub use control::{ClockContext, Devices, IterationReport, LoadAverage};
pub use net::{ConnectivityMonitor, CredentialError, WifiCredentials};
pub use ota::{OtaError, OtaEvent, OtaReceiver};
pub use time::{ClockState, DateTime, SyncStatus};
