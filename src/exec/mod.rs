//! Command execution for pcapctl.
//!
//! This module handles:
//! - The `(exit code, stdout, stderr)` triple every operation returns
//! - Local process execution with full stream capture and optional timeout
//! - Command resolution on `PATH`

pub mod local;

pub use local::{LocalTool, ToolRunner, run_local};

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Exit code reported when a command was killed for exceeding its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code reported when the program to run could not be found.
pub const NOT_FOUND_EXIT_CODE: i32 = 127;

/// Longest wait a deadline is ever set to. Larger timeouts are clamped.
pub const MAX_WAIT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Instant at which a wait of `limit` from now ends, clamped to [`MAX_WAIT`].
pub fn deadline_after(limit: Duration) -> Instant {
	let now = Instant::now();
	now.checked_add(limit.min(MAX_WAIT)).unwrap_or(now)
}

/// Outcome of one local or remote command.
///
/// A non-zero `exit_code` is ordinary data, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
	pub exit_code: i32,
	pub stdout: String,
	pub stderr: String,
}

impl CommandResult {
	pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
		CommandResult {
			exit_code,
			stdout: stdout.into(),
			stderr: stderr.into(),
		}
	}

	/// A failed result carrying only an explanatory message on stderr.
	pub fn failure(exit_code: i32, message: impl Into<String>) -> Self {
		CommandResult::new(exit_code, "", message)
	}

	/// Fold a non-fatal error into a result triple.
	pub fn from_error(err: &Error) -> Self {
		let exit_code = match err {
			Error::Timeout { .. } => TIMEOUT_EXIT_CODE,
			Error::CommandNotFound { .. } => NOT_FOUND_EXIT_CODE,
			_ => 1,
		};
		CommandResult::failure(exit_code, error_chain(err))
	}

	pub fn success(&self) -> bool {
		self.exit_code == 0
	}

	pub fn into_triple(self) -> (i32, String, String) {
		(self.exit_code, self.stdout, self.stderr)
	}
}

/// Fold non-fatal errors into a failure triple; fatal ones pass through.
///
/// Callers of boundary operations always get `(code, stdout, stderr)` except
/// for authentication and path validation failures.
pub fn into_outcome(result: Result<CommandResult>) -> Result<CommandResult> {
	match result {
		Ok(outcome) => Ok(outcome),
		Err(e) if e.is_fatal() => Err(e),
		Err(e) => {
			tracing::warn!(error = %e, "operation failed");
			Ok(CommandResult::from_error(&e))
		}
	}
}

/// Render an error with its source chain on one line.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
	let mut message = err.to_string();
	let mut source = err.source();
	while let Some(cause) = source {
		message.push_str(": ");
		message.push_str(&cause.to_string());
		source = cause.source();
	}
	message
}

/// Resolve a command name to its full path.
///
/// If the command contains a path separator, returns it if it exists.
/// Otherwise, searches PATH for the command.
pub fn resolve_command(command: &str) -> Option<PathBuf> {
	let path = Path::new(command);

	if path.components().count() > 1 || path.is_absolute() {
		if path.exists() {
			return Some(path.to_path_buf());
		} else {
			return None;
		}
	}

	if let Ok(path_var) = std::env::var("PATH") {
		for dir in std::env::split_paths(&path_var) {
			let full_path = dir.join(command);
			if full_path.is_file() {
				return Some(full_path);
			}
		}
	}

	None
}
