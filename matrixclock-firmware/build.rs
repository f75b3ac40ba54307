//! Build script for matrixclock-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates clock.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
}

/// Validate clock.toml at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=clock.toml");

    let config_path = Path::new("clock.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: clock.toml not found!                                    ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds clock.toml as its configuration.            ║\n\
            ║  Please create one in the matrixclock-firmware directory.        ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read clock.toml                                ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in clock.toml                        ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = Vec::new();
    validate_keys(&config, &mut errors);
    validate_ranges(&config, &mut errors);

    if !errors.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: Invalid clock configuration                              ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            errors
                .iter()
                .map(|e| format!("║  • {:<62} ║", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    println!("cargo:warning=clock.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Clone, Copy)]
enum Kind {
    Str,
    Int,
    Bool,
}

/// Every key the on-device parser understands, by section
const KNOWN_KEYS: &[(&str, &[(&str, Kind)])] = &[
    ("clock", &[("device_name", Kind::Str), ("hostname", Kind::Str)]),
    (
        "ntp",
        &[
            ("server", Kind::Str),
            ("timezone_hours", Kind::Int),
            ("sync_interval_s", Kind::Int),
            ("timeout_ms", Kind::Int),
        ],
    ),
    ("display", &[("intensity", Kind::Int)]),
    ("imu", &[("enabled", Kind::Bool), ("poll_interval_ms", Kind::Int)]),
    (
        "network",
        &[("portal_timeout_s", Kind::Int), ("downtime_limit_s", Kind::Int)],
    ),
    ("loop", &[("budget_ms", Kind::Int)]),
];

/// Reject unknown sections, unknown keys and mistyped values
fn validate_keys(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(root) = config.as_table() else {
        return;
    };

    for (section, value) in root {
        let Some((_, keys)) = KNOWN_KEYS.iter().find(|(name, _)| name == section) else {
            errors.push(format!("unknown section [{}]", section));
            continue;
        };
        let Some(table) = value.as_table() else {
            errors.push(format!("[{}] must be a table", section));
            continue;
        };

        for (key, value) in table {
            let Some((_, kind)) = keys.iter().find(|(name, _)| name == key) else {
                errors.push(format!("[{}] unknown key '{}'", section, key));
                continue;
            };
            let ok = match kind {
                Kind::Str => value.is_str(),
                Kind::Int => value.is_integer(),
                Kind::Bool => value.is_bool(),
            };
            if !ok {
                let expected = match kind {
                    Kind::Str => "a string",
                    Kind::Int => "an integer",
                    Kind::Bool => "true or false",
                };
                errors.push(format!("[{}] {} must be {}", section, key, expected));
            }
        }
    }
}

fn get_int(config: &toml::Value, section: &str, key: &str) -> Option<i64> {
    config.get(section)?.get(key)?.as_integer()
}

fn get_str<'a>(config: &'a toml::Value, section: &str, key: &str) -> Option<&'a str> {
    config.get(section)?.get(key)?.as_str()
}

/// Check value ranges the firmware relies on
fn validate_ranges(config: &toml::Value, errors: &mut Vec<String>) {
    if let Some(tz) = get_int(config, "ntp", "timezone_hours") {
        if !(-12..=14).contains(&tz) {
            errors.push("[ntp] timezone_hours must be -12 to 14".to_string());
        }
    }

    if let Some(intensity) = get_int(config, "display", "intensity") {
        if !(0..=15).contains(&intensity) {
            errors.push("[display] intensity must be 0-15".to_string());
        }
    }

    let positive = [
        ("ntp", "sync_interval_s"),
        ("ntp", "timeout_ms"),
        ("imu", "poll_interval_ms"),
        ("network", "portal_timeout_s"),
        ("network", "downtime_limit_s"),
        ("loop", "budget_ms"),
    ];
    for (section, key) in positive {
        if let Some(value) = get_int(config, section, key) {
            if value <= 0 || value > u32::MAX as i64 {
                errors.push(format!("[{}] {} must be a positive integer", section, key));
            }
        }
    }

    let strings = [("clock", "device_name", 32), ("clock", "hostname", 32), ("ntp", "server", 64)];
    for (section, key, max) in strings {
        if let Some(value) = get_str(config, section, key) {
            if value.is_empty() {
                errors.push(format!("[{}] {} cannot be empty", section, key));
            } else if value.len() > max {
                errors.push(format!("[{}] {} longer than {} bytes", section, key, max));
            }
        }
    }
}
