//! Wire formats spoken by the matrix clock
//!
//! Everything that crosses the network boundary is encoded and decoded
//! here, independent of any network stack:
//!
//! - [`ntp`]: the 48-byte SNTP request and the transmit-timestamp parse
//! - [`http`]: request-line/argument parsing and response framing
//! - [`json`]: the `/getTimedate` payload
//! - [`dhcp`]: the minimal lease server used while the provisioning
//!   access point is up
//! - [`dns`]: catch-all answers that steer portal clients to the form

#![no_std]
#![deny(unsafe_code)]

pub mod dhcp;
pub mod dns;
pub mod http;
pub mod json;
pub mod ntp;

pub use http::{ContentType, HttpError, Method, Request, Response, StatusCode};
pub use json::TimePayload;
pub use ntp::{NtpError, NtpPacket, NTP_PACKET_SIZE};
