//! Remote command execution and file deployment over SSH.
//!
//! This module handles:
//! - Credential resolution and authentication (key file, agent, password)
//! - Scoped sessions that are opened per operation and always closed
//! - Running one command and collecting its full output and exit status
//! - Writing files over SFTP with parent directory creation
//!
//! Every public operation opens a fresh session; nothing is pooled.

pub mod auth;
pub mod exec;
pub mod session;
pub mod sftp;

pub use auth::{AuthMethod, AuthTransport, ConnectionParams, KeyKind, authenticate, decode_private_key};
pub use session::RemoteSession;
pub use sftp::{DEPLOYED_FILE_MODE, RemoteFs, write_remote_file};

use crate::error::Result;
use crate::exec::{CommandResult, into_outcome};
use std::path::Path;
use std::time::Duration;

/// Run `command` on the remote host described by `params`.
///
/// Returns `Err` only for [`crate::Error::AuthenticationFailure`]; every other
/// fault, including a timeout, comes back as a non-zero result.
pub fn run_remote(params: &ConnectionParams, command: &str, timeout: Duration) -> Result<CommandResult> {
	into_outcome(run_in_session(params, command, timeout))
}

/// Write `content` to `remote_path` on the remote host, byte for byte.
///
/// Returns `Err` only for [`crate::Error::AuthenticationFailure`].
pub fn deploy_remote_file(params: &ConnectionParams, remote_path: &str, content: &[u8]) -> Result<CommandResult> {
	into_outcome(deploy_in_session(params, remote_path, content))
}

fn run_in_session(params: &ConnectionParams, command: &str, timeout: Duration) -> Result<CommandResult> {
	let session = RemoteSession::open(params)?;
	tracing::trace!(host = session.host(), method = ?session.auth_method(), "session ready");
	exec::execute(&session, command, timeout)
}

fn deploy_in_session(params: &ConnectionParams, remote_path: &str, content: &[u8]) -> Result<CommandResult> {
	let session = RemoteSession::open(params)?;
	// Dropped before the session on every path
	let sftp = session.sftp()?;
	write_remote_file(&sftp, Path::new(remote_path), content)
}
