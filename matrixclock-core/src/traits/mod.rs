//! Hardware and platform abstraction traits
//!
//! These traits define the interface between the clock logic and the
//! board. The firmware implements them on top of embassy; tests use fakes.

pub mod network;
pub mod sensor;
pub mod storage;
pub mod system;
pub mod timebase;

pub use network::{LinkInfo, NetworkLink, NtpTransport, OtaPort, WebPort};
pub use sensor::{AngleSensor, ButtonInput, SensorError};
pub use storage::CredentialStore;
pub use system::{Diagnostics, RestartReason, SystemControl};
pub use timebase::Timebase;
