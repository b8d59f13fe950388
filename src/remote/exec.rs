use crate::error::{Error, Result};
use crate::exec::{CommandResult, deadline_after};
use crate::remote::session::{RemoteSession, is_timeout, millis};
use ssh2::Channel;
use std::io::{self, ErrorKind, Read};
use std::time::{Duration, Instant};

/// How often the channel is polled when neither stream had data.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Time allowed for the channel close handshake after output is drained.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Run one command on the remote host.
///
/// Both output streams are read until the remote side signals end of file,
/// then the real exit status is taken from the channel. A non-zero exit code
/// is returned as data. Exceeding `timeout` yields [`Error::Timeout`].
///
/// The caller is responsible for quoting arguments embedded in `command`.
pub fn execute(session: &RemoteSession, command: &str, timeout: Duration) -> Result<CommandResult> {
	let ssh = session.handle();
	let deadline = deadline_after(timeout);
	let fail = |context: &'static str, source: ssh2::Error| {
		if is_timeout(&source) {
			timeout_error(command, timeout)
		} else {
			Error::Ssh { context, source }
		}
	};

	tracing::debug!(host = session.host(), command, "dispatching remote command");
	ssh.set_blocking(true);
	ssh.set_timeout(millis(timeout));
	let mut channel = ssh.channel_session().map_err(|e| fail("channel open", e))?;
	channel.exec(command).map_err(|e| fail("exec", e))?;

	ssh.set_blocking(false);
	let drained = drain(&mut channel, deadline);
	ssh.set_blocking(true);
	ssh.set_timeout(millis(CLOSE_GRACE));

	let (stdout, stderr) = match drained {
		Ok(Some(streams)) => streams,
		Ok(None) => {
			tracing::warn!(host = session.host(), command, "remote command timed out");
			let _ = channel.close();
			return Err(timeout_error(command, timeout));
		}
		Err(source) => {
			let _ = channel.close();
			return Err(Error::CommandFailed {
				command: command.to_string(),
				source,
			});
		}
	};

	channel.wait_close().map_err(|e| fail("channel close", e))?;
	let mut exit_code = channel.exit_status().map_err(|e| fail("exit status", e))?;
	let mut stderr = String::from_utf8_lossy(&stderr).into_owned();

	// A command killed by a signal reports no exit status, which libssh2 reads as 0.
	if let Ok(signal) = channel.exit_signal()
		&& let Some(name) = signal.exit_signal
	{
		exit_code = -1;
		if !stderr.is_empty() && !stderr.ends_with('\n') {
			stderr.push('\n');
		}
		stderr.push_str(&format!("terminated by signal {name}"));
	}

	tracing::debug!(host = session.host(), command, exit_code, "remote command finished");
	Ok(CommandResult::new(
		exit_code,
		String::from_utf8_lossy(&stdout),
		stderr,
	))
}

fn timeout_error(command: &str, timeout: Duration) -> Error {
	Error::Timeout {
		command: command.to_string(),
		seconds: timeout.as_secs(),
	}
}

/// The two output streams of a running command.
pub(crate) trait OutputStreams {
	fn read_stdout(&mut self, buf: &mut [u8]) -> io::Result<usize>;
	fn read_stderr(&mut self, buf: &mut [u8]) -> io::Result<usize>;
	/// Whether the remote side has signalled end of file.
	fn eof(&self) -> bool;
}

impl OutputStreams for Channel {
	fn read_stdout(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		Read::read(self, buf)
	}

	fn read_stderr(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		self.stderr().read(buf)
	}

	fn eof(&self) -> bool {
		Channel::eof(self)
	}
}

/// Read stdout and stderr until end of file or until the deadline passes.
///
/// Returns `Ok(None)` on timeout. The session must be in non-blocking mode.
fn drain<S: OutputStreams>(streams: &mut S, deadline: Instant) -> io::Result<Option<(Vec<u8>, Vec<u8>)>> {
	let mut stdout = Vec::new();
	let mut stderr = Vec::new();
	let mut buf = [0u8; 8192];

	loop {
		let mut progressed = absorb(streams.read_stdout(&mut buf), &buf, &mut stdout)?;
		progressed |= absorb(streams.read_stderr(&mut buf), &buf, &mut stderr)?;

		if !progressed && streams.eof() {
			return Ok(Some((stdout, stderr)));
		}
		if Instant::now() >= deadline {
			return Ok(None);
		}
		if !progressed {
			std::thread::sleep(POLL_INTERVAL);
		}
	}
}

/// Move the bytes of one non-blocking read into `sink`. Returns whether anything was read.
fn absorb(read: io::Result<usize>, buf: &[u8], sink: &mut Vec<u8>) -> io::Result<bool> {
	match read {
		Ok(0) => Ok(false),
		Ok(n) => {
			sink.extend_from_slice(&buf[..n]);
			Ok(true)
		}
		Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
		Err(e) => Err(e),
	}
}
