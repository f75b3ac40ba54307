//! Configuration loading and parsing
//!
//! The configuration is compiled in from clock.toml and parsed at boot by
//! a small no_std parser.

pub mod loader;
pub mod toml;

pub use loader::load_config;
pub use toml::parse_config;
