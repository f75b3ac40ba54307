//! Device configuration
//!
//! Every tunable of the clock. The firmware fills this from its embedded
//! `clock.toml`; anything missing keeps the default below.

use heapless::String;

/// Firmware version shown on the diagnostics page
pub const VERSION: &str = "0.6.0";

/// Maximum length of a name or hostname
pub const MAX_NAME_LEN: usize = 32;

/// Maximum length of the NTP server name
pub const MAX_SERVER_LEN: usize = 64;

/// Highest MAX7219 intensity
pub const MAX_INTENSITY: u8 = 15;

/// Errors from validating a configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A string does not fit its buffer
    TooLong,
    /// Intensity above 15
    InvalidIntensity,
    /// Timezone offset outside -12..=14 hours
    InvalidTimezone,
    /// An interval or budget is zero
    ZeroInterval,
    /// Empty server or hostname
    Empty,
}

/// Complete clock configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    /// Title of the web pages
    pub device_name: String<MAX_NAME_LEN>,
    /// DHCP hostname and portal SSID
    pub hostname: String<MAX_NAME_LEN>,
    /// NTP server, resolved on every query
    pub ntp_server: String<MAX_SERVER_LEN>,
    /// Whole-hour offset added to UTC
    pub timezone_hours: i8,
    /// Seconds between NTP resyncs
    pub sync_interval_s: u32,
    /// How long to wait for an NTP response
    pub ntp_timeout_ms: u32,
    /// LED brightness 0..=15
    pub intensity: u8,
    /// Use the tilt sensor for orientation
    pub imu_enabled: bool,
    /// Orientation polling period
    pub orientation_poll_ms: u32,
    /// Provisioning portal lifetime before a hard reset
    pub portal_timeout_s: u32,
    /// Accumulated WiFi downtime that forces a restart
    pub downtime_limit_s: u32,
    /// Target loop period
    pub loop_budget_ms: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            device_name: fixed("NTP Clock"),
            hostname: fixed("NTP_Clock"),
            ntp_server: fixed("au.pool.ntp.org"),
            timezone_hours: 10,
            sync_interval_s: 60 * 60 * 8,
            ntp_timeout_ms: 1500,
            intensity: 1,
            imu_enabled: true,
            orientation_poll_ms: 500,
            portal_timeout_s: 300,
            downtime_limit_s: 300,
            loop_budget_ms: 50,
        }
    }
}

fn fixed<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    let _ = out.push_str(s);
    out
}

impl ClockConfig {
    /// Check ranges the rest of the firmware relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hostname.is_empty() || self.ntp_server.is_empty() {
            return Err(ConfigError::Empty);
        }
        if self.intensity > MAX_INTENSITY {
            return Err(ConfigError::InvalidIntensity);
        }
        if !(-12..=14).contains(&self.timezone_hours) {
            return Err(ConfigError::InvalidTimezone);
        }
        if self.sync_interval_s == 0
            || self.ntp_timeout_ms == 0
            || self.orientation_poll_ms == 0
            || self.loop_budget_ms == 0
        {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }

    /// Replace a string field, rejecting values that do not fit
    pub fn set_str<const N: usize>(field: &mut String<N>, value: &str) -> Result<(), ConfigError> {
        let mut replacement = String::new();
        replacement.push_str(value).map_err(|_| ConfigError::TooLong)?;
        *field = replacement;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClockConfig::default();
        assert_eq!(config.device_name.as_str(), "NTP Clock");
        assert_eq!(config.hostname.as_str(), "NTP_Clock");
        assert_eq!(config.ntp_server.as_str(), "au.pool.ntp.org");
        assert_eq!(config.timezone_hours, 10);
        assert_eq!(config.sync_interval_s, 28_800);
        assert_eq!(config.intensity, 1);
        assert_eq!(config.loop_budget_ms, 50);
        assert_eq!(config.downtime_limit_s, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_ranges() {
        let mut config = ClockConfig::default();
        config.intensity = 16;
        assert_eq!(config.validate(), Err(ConfigError::InvalidIntensity));

        let mut config = ClockConfig::default();
        config.timezone_hours = 15;
        assert_eq!(config.validate(), Err(ConfigError::InvalidTimezone));

        let mut config = ClockConfig::default();
        config.loop_budget_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroInterval));

        let mut config = ClockConfig::default();
        config.ntp_server.clear();
        assert_eq!(config.validate(), Err(ConfigError::Empty));
    }

    #[test]
    fn test_set_str() {
        let mut config = ClockConfig::default();
        ClockConfig::set_str(&mut config.ntp_server, "pool.ntp.org").unwrap();
        assert_eq!(config.ntp_server.as_str(), "pool.ntp.org");

        let long = "an-unreasonably-long-clock-hostname";
        assert!(long.len() > MAX_NAME_LEN);
        assert_eq!(
            ClockConfig::set_str(&mut config.hostname, long),
            Err(ConfigError::TooLong)
        );
        assert_eq!(config.hostname.as_str(), "NTP_Clock");
    }
}
