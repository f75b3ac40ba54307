//! SNTP request encoding and response decoding.
//!
//! Packet format (48 bytes, only the fields the clock touches):
//! - byte 0: LI / VN / Mode (0xE3: LI=3 unsynchronised, VN=4, Mode=3 client)
//! - byte 1: stratum (0)
//! - byte 2: poll interval exponent (6)
//! - byte 3: precision (0xEC)
//! - bytes 12..16: reference identifier, the literal `1N14`
//! - bytes 40..44: transmit timestamp seconds, big-endian, era 1900

/// Size of an NTP packet in bytes
pub const NTP_PACKET_SIZE: usize = 48;

/// Server port
pub const NTP_PORT: u16 = 123;

/// Local UDP port the clock listens on
pub const NTP_LOCAL_PORT: u16 = 2390;

/// How long to wait for a response
pub const NTP_TIMEOUT_MS: u32 = 1500;

/// Seconds between 1900-01-01 and 1970-01-01
pub const SEVENTY_YEARS_SECS: i64 = 2_208_988_800;

/// Seconds per hour
pub const SECS_PER_HOUR: i64 = 3600;

/// Offset of the transmit timestamp seconds field
const TRANSMIT_SECONDS_OFFSET: usize = 40;

/// A raw NTP packet
pub type NtpPacket = [u8; NTP_PACKET_SIZE];

/// Errors that can occur while decoding a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NtpError {
    /// Response shorter than a full NTP packet
    ShortPacket,
    /// No response before the timeout
    Timeout,
    /// Server name did not resolve
    DnsFailed,
    /// Socket bind/send/receive failed
    Socket,
}

/// Build the client request packet
pub fn build_request() -> NtpPacket {
    let mut packet = [0u8; NTP_PACKET_SIZE];
    packet[0] = 0b1110_0011; // LI, Version, Mode
    packet[1] = 0; // Stratum, or type of clock
    packet[2] = 6; // Polling interval
    packet[3] = 0xEC; // Peer clock precision
    // bytes 4..12: root delay and root dispersion stay zero
    packet[12] = 49;
    packet[13] = 0x4E;
    packet[14] = 49;
    packet[15] = 52;
    packet
}

/// Extract the transmit timestamp (seconds since 1900) from a response
pub fn transmit_seconds(response: &[u8]) -> Result<u32, NtpError> {
    if response.len() < NTP_PACKET_SIZE {
        return Err(NtpError::ShortPacket);
    }
    let b = &response[TRANSMIT_SECONDS_OFFSET..TRANSMIT_SECONDS_OFFSET + 4];
    Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

/// Convert NTP seconds to local Unix-epoch seconds
///
/// No plausibility check is made: a timestamp before 1970 yields a
/// negative epoch.
pub fn to_local_epoch(secs_since_1900: u32, timezone_hours: i8) -> i64 {
    secs_since_1900 as i64 - SEVENTY_YEARS_SECS + timezone_hours as i64 * SECS_PER_HOUR
}

/// Decode a response straight to local epoch seconds
pub fn parse_response(response: &[u8], timezone_hours: i8) -> Result<i64, NtpError> {
    transmit_seconds(response).map(|secs| to_local_epoch(secs, timezone_hours))
}
