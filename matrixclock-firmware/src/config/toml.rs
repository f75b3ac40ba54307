//! Simple TOML parser for the clock configuration
//!
//! Handles only the subset clock.toml uses: `[section]` headers,
//! `key = value` pairs with string, integer and boolean values, and `#`
//! comments. Arrays, inline tables and multi-line strings are not
//! supported. Unknown sections and keys are skipped; build.rs rejects them
//! before they reach the device.

use matrixclock_core::config::{ClockConfig, ConfigError};

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Malformed section header
    InvalidSection,
    /// Value has the wrong type or is out of range
    InvalidValue,
    /// String longer than its field
    TooLong,
    /// Parsed configuration failed validation
    Invalid(ConfigError),
}

impl From<ConfigError> for ParseError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::TooLong => ParseError::TooLong,
            other => ParseError::Invalid(other),
        }
    }
}

/// Current parsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Clock,
    Ntp,
    Display,
    Imu,
    Network,
    Loop,
    Unknown,
}

/// Parse TOML text into a validated [`ClockConfig`]
///
/// Keys that are absent keep their defaults.
pub fn parse_config(input: &str) -> Result<ClockConfig, ParseError> {
    let mut config = ClockConfig::default();
    let mut section = Section::Root;

    for line in input.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') {
            section = parse_section_header(line)?;
            continue;
        }

        if let Some((key, value)) = parse_key_value(line) {
            apply_value(section, key, value, &mut config)?;
        }
    }

    config.validate()?;
    Ok(config)
}

/// Parse a header line like `[ntp]`, trailing comment allowed
fn parse_section_header(line: &str) -> Result<Section, ParseError> {
    let end = line.find(']').ok_or(ParseError::InvalidSection)?;
    let rest = line[end + 1..].trim();
    if !rest.is_empty() && !rest.starts_with('#') {
        return Err(ParseError::InvalidSection);
    }

    Ok(match line[1..end].trim() {
        "clock" => Section::Clock,
        "ntp" => Section::Ntp,
        "display" => Section::Display,
        "imu" => Section::Imu,
        "network" => Section::Network,
        "loop" => Section::Loop,
        "" => return Err(ParseError::InvalidSection),
        _ => Section::Unknown,
    })
}

/// Parse `key = value`, dropping an inline comment
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = line[eq_pos + 1..].trim();

    // Remove inline comments
    let value = if let Some(hash_pos) = value.find('#') {
        // Make sure # is not inside a string
        let quote_count = value[..hash_pos].matches('"').count();
        if quote_count % 2 == 0 {
            value[..hash_pos].trim()
        } else {
            value
        }
    } else {
        value
    };

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Parse a string value (removes quotes)
fn parse_string(value: &str) -> Result<&str, ParseError> {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        Ok(&value[1..value.len() - 1])
    } else {
        // Allow unquoted strings for simple values
        Ok(value)
    }
}

/// Parse an integer value
fn parse_int<T: core::str::FromStr>(value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidValue)
}

/// Parse a boolean value
fn parse_bool(value: &str) -> Result<bool, ParseError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ParseError::InvalidValue),
    }
}

fn apply_value(
    section: Section,
    key: &str,
    value: &str,
    config: &mut ClockConfig,
) -> Result<(), ParseError> {
    match (section, key) {
        (Section::Clock, "device_name") => {
            ClockConfig::set_str(&mut config.device_name, parse_string(value)?)?
        }
        (Section::Clock, "hostname") => {
            ClockConfig::set_str(&mut config.hostname, parse_string(value)?)?
        }
        (Section::Ntp, "server") => {
            ClockConfig::set_str(&mut config.ntp_server, parse_string(value)?)?
        }
        (Section::Ntp, "timezone_hours") => config.timezone_hours = parse_int(value)?,
        (Section::Ntp, "sync_interval_s") => config.sync_interval_s = parse_int(value)?,
        (Section::Ntp, "timeout_ms") => config.ntp_timeout_ms = parse_int(value)?,
        (Section::Display, "intensity") => config.intensity = parse_int(value)?,
        (Section::Imu, "enabled") => config.imu_enabled = parse_bool(value)?,
        (Section::Imu, "poll_interval_ms") => config.orientation_poll_ms = parse_int(value)?,
        (Section::Network, "portal_timeout_s") => config.portal_timeout_s = parse_int(value)?,
        (Section::Network, "downtime_limit_s") => config.downtime_limit_s = parse_int(value)?,
        (Section::Loop, "budget_ms") => config.loop_budget_ms = parse_int(value)?,
        _ => {}
    }
    Ok(())
}
