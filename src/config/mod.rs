//! Configuration loading for pcapctl.
//!
//! This module handles:
//! - TOML settings file parsing
//! - Environment variable overrides
//! - Validation of the effective settings

pub mod loader;
pub mod parser;
pub mod types;

pub use loader::{apply_env_overrides, load_settings, user_config_path};
pub use parser::{parse_config_file, parse_config_str};
pub use types::{CaptureSettings, RemoteSettings, Settings, expand_home};
