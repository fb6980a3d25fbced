//! Configuration module for Fleet Runner.
//!
//! This module handles parsing, validation, and name-indexed patching of
//! server settings. A fleet is described by a JSON [`FleetConfig`] holding
//! one [`ServerProperties`] record per server.
//!
//! # Examples
//!
//! Loading a configuration from a file:
//!
//! ```no_run
//! use fleet_runner::config::FleetConfig;
//!
//! let config = FleetConfig::from_file("fleet.json").unwrap();
//! println!("Loaded configuration with {} servers", config.servers.len());
//! ```
//!
//! Changing a setting by name:
//!
//! ```
//! use fleet_runner::config::{ServerProperties, Setting};
//!
//! let mut props = ServerProperties::new("Alpha", "server.jar");
//! let setting = props.apply_patch("maxMemory", "2048").unwrap();
//! assert_eq!(setting, Setting::MaxMemory);
//! assert_eq!(props.max_memory, 2048);
//!
//! // identity fields cannot be patched
//! assert!(props.apply_patch("displayName", "Beta").is_err());
//! ```
mod parser;
mod patch;
pub mod validator;

pub use parser::{FleetConfig, LaunchSpec, ServerProperties, ServerType};
pub use patch::{PROTECTED_SETTINGS, Setting};
pub use validator::validate_config;
