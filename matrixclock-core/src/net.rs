//! Station credentials and link supervision

use heapless::String;
use serde::{Deserialize, Serialize};

/// Longest SSID accepted
pub const MAX_SSID_LEN: usize = 32;

/// Longest passphrase accepted (64 hex digits)
pub const MAX_PASSWORD_LEN: usize = 64;

/// Buffer large enough for encoded [`WifiCredentials`]
pub const CREDENTIALS_BUFFER_SIZE: usize = MAX_SSID_LEN + MAX_PASSWORD_LEN + 8;

/// Credential validation and persistence errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CredentialError {
    /// SSID empty or longer than 32 bytes
    InvalidSsid,
    /// Passphrase neither empty, 8..=63 characters, nor 64 hex digits
    InvalidPassword,
    /// Serialization failed
    Encoding,
    /// The backing store failed
    Storage,
}

/// WPA station credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentials {
    pub ssid: String<MAX_SSID_LEN>,
    pub password: String<MAX_PASSWORD_LEN>,
}

impl WifiCredentials {
    /// Validated credentials; an empty password joins an open network
    pub fn new(ssid: &str, password: &str) -> Result<Self, CredentialError> {
        let mut credentials = Self {
            ssid: String::new(),
            password: String::new(),
        };
        credentials
            .ssid
            .push_str(ssid)
            .map_err(|_| CredentialError::InvalidSsid)?;
        credentials
            .password
            .push_str(password)
            .map_err(|_| CredentialError::InvalidPassword)?;
        credentials.validate()?;
        Ok(credentials)
    }

    pub fn validate(&self) -> Result<(), CredentialError> {
        if self.ssid.is_empty() {
            return Err(CredentialError::InvalidSsid);
        }
        let password = self.password.as_str();
        let valid = match password.len() {
            0 => true,
            8..=63 => true,
            64 => password.bytes().all(|b| b.is_ascii_hexdigit()),
            _ => false,
        };
        if !valid {
            return Err(CredentialError::InvalidPassword);
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }

    /// Serialize into `buf`, returning the used prefix
    pub fn encode<'a>(&self, buf: &'a mut [u8]) -> Result<&'a [u8], CredentialError> {
        postcard::to_slice(self, buf)
            .map(|used| &*used)
            .map_err(|_| CredentialError::Encoding)
    }

    /// Deserialize and validate stored bytes
    pub fn decode(bytes: &[u8]) -> Result<Self, CredentialError> {
        let credentials: Self = postcard::from_bytes(bytes).map_err(|_| CredentialError::Encoding)?;
        credentials.validate()?;
        Ok(credentials)
    }
}

/// Link transition observed by [`ConnectivityMonitor::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkTransition {
    /// Link lost at the given uptime
    Lost { at_s: u32 },
    /// Link back after `outage_s` seconds
    Restored { outage_s: u32 },
}

/// Tracks connect/disconnect transitions and cumulative downtime
///
/// Downtime is added only when the link comes back, so a single outage
/// is counted once regardless of how often the state is sampled. The
/// restart check adds the outage still in progress on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityMonitor {
    connected: bool,
    last_transition_s: u32,
    downtime_s: u32,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityMonitor {
    /// Starts connected at uptime 0, the state after provisioning
    pub const fn new() -> Self {
        Self {
            connected: true,
            last_transition_s: 0,
            downtime_s: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Total seconds of completed outages
    pub fn downtime_s(&self) -> u32 {
        self.downtime_s
    }

    /// Feed the current link state
    pub fn update(&mut self, connected: bool, uptime_s: u32) -> Option<LinkTransition> {
        if connected == self.connected {
            return None;
        }
        self.connected = connected;
        let since = uptime_s.saturating_sub(self.last_transition_s);
        self.last_transition_s = uptime_s;
        if connected {
            self.downtime_s = self.downtime_s.saturating_add(since);
            Some(LinkTransition::Restored { outage_s: since })
        } else {
            Some(LinkTransition::Lost { at_s: uptime_s })
        }
    }

    /// Completed outages plus the current one, if the link is down
    pub fn downtime_at(&self, uptime_s: u32) -> u32 {
        if self.connected {
            self.downtime_s
        } else {
            let ongoing = uptime_s.saturating_sub(self.last_transition_s);
            self.downtime_s.saturating_add(ongoing)
        }
    }

    /// True while disconnected once the downtime reaches `limit_s`
    pub fn downtime_exceeded(&self, uptime_s: u32, limit_s: u32) -> bool {
        !self.connected && self.downtime_at(uptime_s) >= limit_s
    }
}
