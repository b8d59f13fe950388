use crate::config::parser::parse_config_file;
use crate::config::types::Settings;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Load the effective settings.
///
/// The layering is:
/// 1. Built-in defaults
/// 2. `explicit` config file if given, else the user config file if it exists
/// 3. Environment variable overrides
///
/// The result is validated before it is returned.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
	let mut settings = match explicit {
		Some(path) => parse_config_file(path)?,
		None => match user_config_path() {
			Ok(path) if path.exists() => parse_config_file(&path)?,
			_ => Settings::default(),
		},
	};

	apply_env_overrides(&mut settings, |name| std::env::var(name).ok());
	settings.validate()?;

	Ok(settings)
}

/// Get the path to the user's config file.
pub fn user_config_path() -> Result<PathBuf> {
	let config_dir = dirs::config_dir().ok_or(Error::HomeDirectoryNotFound)?;
	Ok(config_dir.join("pcapctl").join("config.toml"))
}

/// Overlay environment variables onto the settings.
///
/// `lookup` returns the value of a variable, if set.
pub fn apply_env_overrides<F>(settings: &mut Settings, lookup: F)
where
	F: Fn(&str) -> Option<String>,
{
	let remote = &mut settings.remote;
	let text_overrides: [(&str, &mut String); 9] = [
		("SURICATA_HOST", &mut remote.host),
		("SURICATA_USER", &mut remote.user),
		("SURICATA_EVE", &mut remote.eve_log),
		("SURICATA_FAST", &mut remote.fast_log),
		("SURICATA_RULE_DIR", &mut remote.rule_dir),
		("SURICATA_LOCAL_RULE", &mut remote.rule_file),
		("SURICATA_TEST_CMD", &mut remote.test_command),
		("SURICATA_RELOAD_CMD", &mut remote.reload_command),
		("NIC_IFACE", &mut settings.capture.interface),
	];
	for (name, field) in text_overrides {
		if let Some(value) = lookup(name) {
			*field = value;
		}
	}

	// Empty secrets mean "not supplied"
	if let Some(value) = lookup("SURICATA_SSH_KEY") {
		remote.key_path = non_empty(value).map(PathBuf::from);
	}
	if let Some(value) = lookup("SURICATA_SSH_PASSPHRASE") {
		remote.passphrase = non_empty(value);
	}
	if let Some(value) = lookup("SURICATA_PASSWORD") {
		remote.password = non_empty(value);
	}

	let capture = &mut settings.capture;
	if let Some(value) = lookup("USE_SUDO_REPLAY") {
		capture.sudo_replay = is_truthy(&value);
	}
	if let Some(value) = lookup("PCAP_ROOT") {
		capture.root = PathBuf::from(value);
	}
	if let Some(value) = lookup("PCAPCTL_REWRITE_TOOL") {
		capture.rewrite_tool = PathBuf::from(value);
	}
	if let Some(value) = lookup("PCAPCTL_REPLAY_TOOL") {
		capture.replay_tool = PathBuf::from(value);
	}

	if let Some(value) = lookup("API_KEY") {
		settings.api_key = value;
	}
	if let Some(value) = lookup("GIT_WEBHOOK_TOKEN") {
		settings.webhook_token = value;
	}
}

fn non_empty(value: String) -> Option<String> {
	if value.is_empty() { None } else { Some(value) }
}

/// Check if an environment value is truthy.
fn is_truthy(value: &str) -> bool {
	let lower = value.to_lowercase();
	!value.is_empty() && lower != "0" && lower != "false" && lower != "no"
}
