use crate::error::{Error, Result};
use crate::exec::{CommandResult, TIMEOUT_EXIT_CODE, deadline_after};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// How often a child with a deadline is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long to wait for stream readers after a timed-out child was killed.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Something that can invoke an external tool with arguments.
///
/// The capture rewriter talks to the installed tool only through this seam.
pub trait ToolRunner {
	fn run(&self, args: &[String]) -> Result<CommandResult>;
}

/// A locally installed tool invoked as a child process.
#[derive(Debug, Clone)]
pub struct LocalTool {
	pub program: PathBuf,
	pub timeout: Option<Duration>,
}

impl LocalTool {
	pub fn new(program: impl Into<PathBuf>) -> Self {
		LocalTool {
			program: program.into(),
			timeout: None,
		}
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}
}

impl ToolRunner for LocalTool {
	fn run(&self, args: &[String]) -> Result<CommandResult> {
		run_local(&self.program, args, self.timeout)
	}
}

/// Run a program to completion and capture both output streams in full.
///
/// With a timeout, the child is killed once the deadline passes and the
/// result carries exit code 124 plus whatever output was produced.
pub fn run_local(program: &Path, args: &[String], timeout: Option<Duration>) -> Result<CommandResult> {
	let command_line = display_command(program, args);
	tracing::debug!(command = %command_line, "running local command");

	let mut child = Command::new(program)
		.args(args)
		.stdin(Stdio::null())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.spawn()
		.map_err(|source| {
			if source.kind() == std::io::ErrorKind::NotFound {
				Error::CommandNotFound {
					command: program.to_string_lossy().to_string(),
				}
			} else {
				Error::CommandFailed {
					command: command_line.clone(),
					source,
				}
			}
		})?;

	let stdout_rx = child.stdout.take().map(spawn_reader);
	let stderr_rx = child.stderr.take().map(spawn_reader);

	let exit = match timeout {
		Some(limit) => wait_with_deadline(&mut child, limit),
		None => child.wait().map(|status| Some(status.code().unwrap_or(-1))),
	}
	.map_err(|source| Error::CommandFailed {
		command: command_line.clone(),
		source,
	})?;

	match exit {
		Some(exit_code) => Ok(CommandResult::new(
			exit_code,
			collect(stdout_rx, None),
			collect(stderr_rx, None),
		)),
		None => {
			let seconds = timeout.map(|t| t.as_secs()).unwrap_or_default();
			tracing::warn!(command = %command_line, seconds, "local command timed out");
			let stdout = collect(stdout_rx, Some(DRAIN_GRACE));
			let mut stderr = collect(stderr_rx, Some(DRAIN_GRACE));
			if !stderr.is_empty() && !stderr.ends_with('\n') {
				stderr.push('\n');
			}
			stderr.push_str(
				&Error::Timeout {
					command: command_line,
					seconds,
				}
				.to_string(),
			);
			Ok(CommandResult::new(TIMEOUT_EXIT_CODE, stdout, stderr))
		}
	}
}

/// Poll the child until it exits or the deadline passes.
///
/// Returns `None` when the child had to be killed.
fn wait_with_deadline(child: &mut Child, limit: Duration) -> std::io::Result<Option<i32>> {
	let deadline = deadline_after(limit);
	loop {
		if let Some(status) = child.try_wait()? {
			return Ok(Some(status.code().unwrap_or(-1)));
		}
		if Instant::now() >= deadline {
			// The child may exit between try_wait and kill.
			let _ = child.kill();
			let _ = child.wait();
			return Ok(None);
		}
		thread::sleep(POLL_INTERVAL);
	}
}

fn spawn_reader<R: Read + Send + 'static>(mut stream: R) -> mpsc::Receiver<Vec<u8>> {
	let (tx, rx) = mpsc::channel();
	thread::spawn(move || {
		let mut buf = Vec::new();
		let _ = stream.read_to_end(&mut buf);
		let _ = tx.send(buf);
	});
	rx
}

/// Collect a reader's output. A grandchild holding the pipe open can keep
/// the reader alive after a kill, so the wait is bounded in that case.
fn collect(rx: Option<mpsc::Receiver<Vec<u8>>>, limit: Option<Duration>) -> String {
	let Some(rx) = rx else {
		return String::new();
	};
	let bytes = match limit {
		Some(limit) => rx.recv_timeout(limit).unwrap_or_default(),
		None => rx.recv().unwrap_or_default(),
	};
	String::from_utf8_lossy(&bytes).into_owned()
}

fn display_command(program: &Path, args: &[String]) -> String {
	let mut parts = vec![program.to_string_lossy().to_string()];
	parts.extend(args.iter().cloned());
	parts.join(" ")
}
