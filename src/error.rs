use std::path::PathBuf;

/// Library-level structured errors for pcapctl.
///
/// Use `thiserror` for structured errors that library consumers can match on.
/// The CLI binary wraps these with `anyhow` for rich context chains.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read config file: {path}")]
	ConfigRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to parse config file: {path}")]
	ConfigParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("Invalid configuration value for {key}: {reason}")]
	InvalidConfig { key: String, reason: String },

	#[error("Authentication failed for {user}@{host}: {reason}")]
	AuthenticationFailure {
		host: String,
		user: String,
		reason: String,
	},

	#[error("Failed to connect to {host}")]
	Connect {
		host: String,
		#[source]
		source: std::io::Error,
	},

	#[error("SSH {context} failed")]
	Ssh {
		context: &'static str,
		#[source]
		source: ssh2::Error,
	},

	#[error("SFTP {context} failed: {path}")]
	Sftp {
		context: &'static str,
		path: String,
		#[source]
		source: ssh2::Error,
	},

	#[error("Command timed out after {seconds}s: {command}")]
	Timeout { command: String, seconds: u64 },

	#[error("Command execution failed: {command}")]
	CommandFailed {
		command: String,
		#[source]
		source: std::io::Error,
	},

	#[error("Command not found: {command}")]
	CommandNotFound { command: String },

	#[error("Path {path} is outside the capture root {root}")]
	PathResolution { path: PathBuf, root: PathBuf },

	#[error("Invalid address remap entry: {entry} ({reason})")]
	InvalidRemap { entry: String, reason: String },

	#[error("I/O error on {path}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to resolve home directory")]
	HomeDirectoryNotFound,
}

impl Error {
	/// Whether this error must reach the caller instead of being folded into a result triple.
	pub fn is_fatal(&self) -> bool {
		matches!(
			self,
			Error::AuthenticationFailure { .. }
				| Error::PathResolution { .. }
				| Error::InvalidRemap { .. }
		)
	}
}

/// Result type alias using pcapctl's Error.
pub type Result<T> = std::result::Result<T, Error>;
