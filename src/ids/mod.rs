//! Operations against the remote intrusion-detection sensor.
//!
//! Each operation opens its own session with the configured credentials
//! and returns the command's `(exit code, stdout, stderr)` triple.

use crate::config::RemoteSettings;
use crate::error::Result;
use crate::exec::CommandResult;
use crate::remote::{ConnectionParams, deploy_remote_file, run_remote};
use std::borrow::Cow;
use std::time::Duration;

/// Which sensor log to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFile {
	/// Concise alert log.
	Fast,
	/// Structured event log.
	Eve,
}

impl LogFile {
	pub fn path(self, remote: &RemoteSettings) -> &str {
		match self {
			LogFile::Fast => &remote.fast_log,
			LogFile::Eve => &remote.eve_log,
		}
	}
}

/// A bounded live packet capture on the sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
	pub interface: String,
	pub host: String,
	pub count: u32,
	pub duration_secs: u64,
}

/// Quote one argument for the remote POSIX shell.
fn quote(arg: &str) -> Cow<'_, str> {
	shell_escape::unix::escape(Cow::Borrowed(arg))
}

/// Last `lines` lines of `path`, or of the lines matching `pattern` case-insensitively.
pub fn tail_command(path: &str, pattern: Option<&str>, lines: u32) -> String {
	match pattern {
		Some(pattern) => format!(
			"grep -i {} {} | tail -n {lines}",
			quote(pattern),
			quote(path)
		),
		None => format!("tail -n {lines} -F {} | head -n {lines}", quote(path)),
	}
}

pub fn capture_command(request: &CaptureRequest) -> String {
	format!(
		"sudo timeout {} tcpdump -ni {} host {} -c {} -vv",
		request.duration_secs,
		quote(&request.interface),
		quote(&request.host),
		request.count
	)
}

/// Remote sensor control bound to one set of settings.
pub struct IdsControl<'a> {
	remote: &'a RemoteSettings,
	params: ConnectionParams,
}

impl<'a> IdsControl<'a> {
	pub fn new(remote: &'a RemoteSettings) -> Self {
		IdsControl {
			remote,
			params: ConnectionParams::from_settings(remote),
		}
	}

	/// Run an arbitrary, already quoted command with the default timeout.
	pub fn run(&self, command: &str) -> Result<CommandResult> {
		self.run_with_timeout(command, self.remote.command_timeout())
	}

	fn run_with_timeout(&self, command: &str, timeout: Duration) -> Result<CommandResult> {
		tracing::info!(host = %self.remote.host, command, "dispatching remote command");
		let result = run_remote(&self.params, command, timeout)?;
		tracing::debug!(exit_code = result.exit_code, "remote command finished");
		Ok(result)
	}

	pub fn tail_log(&self, path: &str, pattern: Option<&str>, lines: u32) -> Result<CommandResult> {
		self.run(&tail_command(path, pattern, lines))
	}

	/// Replace the sensor's local rule file with `content`, byte for byte.
	pub fn deploy_rules(&self, content: &str) -> Result<CommandResult> {
		let path = self.remote.rule_path();
		tracing::info!(host = %self.remote.host, path = %path, bytes = content.len(), "deploying rules");
		deploy_remote_file(&self.params, &path, content.as_bytes())
	}

	pub fn validate_rules(&self) -> Result<CommandResult> {
		self.run(&self.remote.test_command)
	}

	pub fn reload(&self) -> Result<CommandResult> {
		self.run(&self.remote.reload_command)
	}

	/// Capture on the sensor. The remote timeout leaves a grace margin past
	/// the capture duration so the sensor-side `timeout` fires first.
	pub fn capture(&self, request: &CaptureRequest) -> Result<CommandResult> {
		let timeout = Duration::from_secs(
			request
				.duration_secs
				.saturating_add(self.remote.capture_grace_secs),
		);
		self.run_with_timeout(&capture_command(request), timeout)
	}
}
