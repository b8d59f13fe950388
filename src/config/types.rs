use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Effective configuration for pcapctl.
///
/// Built once at startup (defaults, then an optional TOML file, then
/// environment overrides) and handed to every operation by reference.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
	/// Remote IDS sensor reached over SSH.
	pub remote: RemoteSettings,

	/// Local capture storage, rewrite and replay tooling.
	pub capture: CaptureSettings,

	/// Shared key expected by the HTTP front end.
	pub api_key: String,

	/// Token expected on rule-sync webhooks.
	pub webhook_token: String,
}

/// Connection and sensor settings for the remote host.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RemoteSettings {
	pub host: String,
	pub user: String,

	/// Private key path. A leading `~` expands to the home directory.
	pub key_path: Option<PathBuf>,
	pub passphrase: Option<String>,
	pub password: Option<String>,

	/// Concise alert log (`fast.log`).
	pub fast_log: String,

	/// Structured event log (`eve.json`).
	pub eve_log: String,

	pub rule_dir: String,
	pub rule_file: String,
	pub test_command: String,
	pub reload_command: String,

	/// Seconds allowed for connection establishment and authentication.
	pub connect_timeout_secs: u64,

	/// Seconds allowed for an ordinary remote command.
	pub command_timeout_secs: u64,

	/// Extra seconds granted to capture commands on top of their own duration.
	pub capture_grace_secs: u64,
}

/// Local capture handling settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CaptureSettings {
	/// Root directory every managed capture file lives under.
	pub root: PathBuf,

	/// Interface captures are replayed onto.
	pub interface: String,

	/// Prefix replay with `sudo -n`.
	pub sudo_replay: bool,

	pub rewrite_tool: PathBuf,
	pub replay_tool: PathBuf,
}

impl Default for Settings {
	fn default() -> Self {
		Settings {
			remote: RemoteSettings::default(),
			capture: CaptureSettings::default(),
			api_key: "devkey".to_string(),
			webhook_token: String::new(),
		}
	}
}

impl Default for RemoteSettings {
	fn default() -> Self {
		RemoteSettings {
			host: "127.0.0.1".to_string(),
			user: "root".to_string(),
			key_path: Some(PathBuf::from("~/.ssh/id_ed25519")),
			passphrase: None,
			password: None,
			fast_log: "/var/log/suricata/fast.log".to_string(),
			eve_log: "/var/log/suricata/eve.json".to_string(),
			rule_dir: "/etc/suricata/rules".to_string(),
			rule_file: "local.rules".to_string(),
			test_command: "suricata -T -S /etc/suricata/rules/local.rules".to_string(),
			reload_command: "systemctl reload suricata".to_string(),
			connect_timeout_secs: 15,
			command_timeout_secs: 30,
			capture_grace_secs: 10,
		}
	}
}

impl Default for CaptureSettings {
	fn default() -> Self {
		CaptureSettings {
			root: PathBuf::from("/home/llm/pcaps"),
			interface: "eth0".to_string(),
			sudo_replay: false,
			rewrite_tool: PathBuf::from("tcprewrite"),
			replay_tool: PathBuf::from("tcpreplay"),
		}
	}
}

impl RemoteSettings {
	pub fn connect_timeout(&self) -> Duration {
		Duration::from_secs(self.connect_timeout_secs)
	}

	pub fn command_timeout(&self) -> Duration {
		Duration::from_secs(self.command_timeout_secs)
	}

	/// Full remote path of the deployed rule file.
	pub fn rule_path(&self) -> String {
		format!(
			"{}/{}",
			self.rule_dir.trim_end_matches('/'),
			self.rule_file
		)
	}

	/// Key path with `~` expanded.
	pub fn expanded_key_path(&self) -> Option<PathBuf> {
		self.key_path.as_deref().map(expand_home)
	}
}

impl Settings {
	/// Validate values that serde cannot check on its own.
	pub fn validate(&self) -> Result<(), crate::error::Error> {
		let timeouts = [
			("remote.connect-timeout-secs", self.remote.connect_timeout_secs),
			("remote.command-timeout-secs", self.remote.command_timeout_secs),
		];
		for (key, value) in timeouts {
			if value == 0 {
				return Err(crate::error::Error::InvalidConfig {
					key: key.to_string(),
					reason: "must be greater than zero".to_string(),
				});
			}
		}

		let rule_file = Path::new(&self.remote.rule_file);
		if rule_file.file_name() != Some(rule_file.as_os_str()) {
			return Err(crate::error::Error::InvalidConfig {
				key: "remote.rule-file".to_string(),
				reason: "must be a bare file name".to_string(),
			});
		}

		Ok(())
	}
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
	if let Ok(rest) = path.strip_prefix("~")
		&& let Some(home) = dirs::home_dir()
	{
		return home.join(rest);
	}
	path.to_path_buf()
}
