use crate::config::types::Settings;
use crate::error::{Error, Result};
use std::path::Path;

/// Parse a settings file from the given path.
pub fn parse_config_file(path: &Path) -> Result<Settings> {
	let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
		path: path.to_path_buf(),
		source,
	})?;

	parse_config_str(&content, path)
}

/// Parse settings from a string (useful for testing).
///
/// Missing keys keep their defaults; validation happens after environment
/// overrides are applied.
pub fn parse_config_str(content: &str, path: &Path) -> Result<Settings> {
	toml::from_str(content).map_err(|source| Error::ConfigParse {
		path: path.to_path_buf(),
		source,
	})
}
