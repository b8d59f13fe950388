//! Local capture replay onto a network interface.

use crate::config::CaptureSettings;
use crate::error::Result;
use crate::exec::{CommandResult, into_outcome, run_local};
use crate::rewrite::resolve_capture_path;
use std::path::{Path, PathBuf};

/// Options for one replay run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayRequest {
	pub capture: PathBuf,
	/// Interface to send on; the configured one when `None`.
	pub interface: Option<String>,
	/// Rate in Mbps; as fast as recorded when `None`.
	pub rate: Option<String>,
	pub loops: u32,
}

/// Program and arguments for the replay tool, including the `sudo -n`
/// prefix when configured.
pub fn replay_args(settings: &CaptureSettings, request: &ReplayRequest, capture: &Path) -> (PathBuf, Vec<String>) {
	let interface = request.interface.as_deref().unwrap_or(&settings.interface);

	let mut args = Vec::new();
	if let Some(rate) = &request.rate {
		args.push(format!("--mbps={rate}"));
	}
	args.extend([
		"--intf1".to_string(),
		interface.to_string(),
		"--loop".to_string(),
		request.loops.to_string(),
		capture.to_string_lossy().to_string(),
	]);

	if settings.sudo_replay {
		let mut prefixed = vec![
			"-n".to_string(),
			settings.replay_tool.to_string_lossy().to_string(),
		];
		prefixed.extend(args);
		return (PathBuf::from("sudo"), prefixed);
	}
	(settings.replay_tool.clone(), args)
}

/// Replay a capture that lives under the configured root.
///
/// Returns `Err` only when the capture path escapes the root.
pub fn replay_capture(settings: &CaptureSettings, request: &ReplayRequest) -> Result<CommandResult> {
	let capture = resolve_capture_path(&settings.root, &request.capture)?;
	let (program, args) = replay_args(settings, request, &capture);
	tracing::info!(
		capture = %capture.display(),
		program = %program.display(),
		"replaying capture"
	);
	into_outcome(run_local(&program, &args, None))
}
