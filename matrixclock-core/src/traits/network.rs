//! Network collaborators: link state, NTP, HTTP and OTA

use core::future::Future;

use heapless::String;
use matrixclock_protocol::{NtpError, NtpPacket, Request, Response};

use crate::ota::{OtaError, OtaEvent};

/// Snapshot of the station link for the diagnostics page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkInfo {
    pub ssid: String<32>,
    /// Signal strength in dBm
    pub rssi: i16,
    pub ip: [u8; 4],
}

/// The WiFi station link
pub trait NetworkLink {
    /// Associated and holding an IPv4 address
    fn is_connected(&self) -> bool;

    /// Current link details
    fn info(&self) -> LinkInfo;

    /// Leave the network
    fn disconnect(&mut self) -> impl Future<Output = ()>;
}

/// One-shot NTP exchange
pub trait NtpTransport {
    /// Resolve `server`, send `request` and wait up to `timeout_ms` for a
    /// full-size response
    fn exchange(
        &mut self,
        server: &str,
        request: &NtpPacket,
        timeout_ms: u32,
    ) -> impl Future<Output = Result<NtpPacket, NtpError>>;
}

/// The configuration HTTP server
pub trait WebPort {
    /// Serve at most one pending request with `handler`
    ///
    /// Returns `true` when a request was handled.
    fn poll<F>(&mut self, handler: F) -> impl Future<Output = bool>
    where
        F: FnMut(&Request<'_>) -> Response;
}

/// Over-the-air update listener
pub trait OtaPort {
    /// Receive a pending update, if a pusher is connected
    ///
    /// Progress is reported through `on_event` while the transfer runs.
    /// Returns `None` when nothing was pending.
    fn service<F>(&mut self, on_event: F) -> impl Future<Output = Option<Result<(), OtaError>>>
    where
        F: FnMut(OtaEvent);
}
