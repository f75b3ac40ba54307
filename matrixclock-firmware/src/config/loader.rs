//! Boot-time configuration
//!
//! Parses the embedded clock.toml. A parse failure is not fatal: the
//! clock falls back to its built-in defaults and logs why.

use defmt::*;

use matrixclock_core::config::{ClockConfig, VERSION};

use super::toml::parse_config;

/// Parse `source`, falling back to defaults on any error
pub fn load_config(source: &str) -> ClockConfig {
    match parse_config(source) {
        Ok(config) => {
            info!("Parsed embedded configuration");
            log_config_summary(&config);
            config
        }
        Err(e) => {
            warn!("Embedded configuration rejected: {:?}", e);
            warn!("Using built-in defaults");
            let config = ClockConfig::default();
            log_config_summary(&config);
            config
        }
    }
}

/// Log a summary of the active configuration
fn log_config_summary(config: &ClockConfig) {
    info!("{} v{} ({})", config.device_name.as_str(), VERSION, config.hostname.as_str());
    debug!(
        "  ntp {} UTC{=i8}h every {}s, timeout {}ms",
        config.ntp_server.as_str(),
        config.timezone_hours,
        config.sync_interval_s,
        config.ntp_timeout_ms
    );
    debug!(
        "  intensity {}, imu {} every {}ms",
        config.intensity, config.imu_enabled, config.orientation_poll_ms
    );
    debug!(
        "  portal {}s, downtime limit {}s, loop {}ms",
        config.portal_timeout_s, config.downtime_limit_s, config.loop_budget_ms
    );
}
