//! Capture address rewriting through the locally installed rewrite tool.
//!
//! This module handles:
//! - Parsing per-direction IPv4 address maps
//! - Probing the tool for bulk and single-pair remapping support
//! - Choosing a strategy and running it, chaining single-pair steps when needed
//! - Keeping inputs and outputs inside the managed capture root
//!
//! Capabilities are probed on every request and never cached.

pub mod chain;
pub mod paths;
pub mod probe;
pub mod remap;
pub mod strategy;

pub use chain::execute_plan;
pub use paths::{REWRITTEN_DIR, resolve_capture_path, rewritten_output_path};
pub use probe::{Capabilities, probe};
pub use remap::{AddressRemap, Direction};
pub use strategy::{Operation, RewritePlan, RewriteStep, StepOutput, Strategy, select_strategy};

use crate::config::CaptureSettings;
use crate::error::Result;
use crate::exec::{CommandResult, LocalTool, ToolRunner, into_outcome};
use std::path::{Path, PathBuf};

/// Stderr of the result returned when the tool can remap nothing.
pub const UNSUPPORTED_MESSAGE: &str = "tcprewrite lacks srcipmap/dstipmap and pnat on this system";

/// Rewrite `input` into `output`, remapping addresses per direction.
///
/// Returns `Err` only for invalid requests; a tool that is missing or
/// fails comes back as a non-zero result.
pub fn rewrite_capture<R: ToolRunner + ?Sized>(
	tool: &R,
	input: &Path,
	output: &Path,
	source: &AddressRemap,
	destination: &AddressRemap,
) -> Result<CommandResult> {
	let capabilities = probe(tool);
	let strategy = select_strategy(&capabilities, source, destination);
	tracing::info!(
		strategy = strategy.name(),
		source_pairs = source.len(),
		destination_pairs = destination.len(),
		"selected rewrite strategy"
	);

	if let Strategy::BulkMultiMap {
		source_map,
		destination_map,
	} = &strategy
	{
		for (remap, map) in [(source, source_map), (destination, destination_map)] {
			if !remap.is_empty() && map.is_none() {
				tracing::warn!(
					direction = %remap.direction(),
					pairs = remap.len(),
					"rewrite tool has no bulk map for this direction; pairs not applied"
				);
			}
		}
	}

	let Some(plan) = strategy.plan() else {
		return Ok(CommandResult::failure(1, UNSUPPORTED_MESSAGE));
	};
	into_outcome(execute_plan(tool, &plan, input, output))
}

/// Rewrite a capture under the configured root into its mirrored location
/// below [`REWRITTEN_DIR`], using the configured rewrite tool.
///
/// `input` may be relative to the root. Returns the output path alongside
/// the result.
pub fn rewrite_managed(
	capture: &CaptureSettings,
	input: &Path,
	source: &AddressRemap,
	destination: &AddressRemap,
) -> Result<(PathBuf, CommandResult)> {
	let input = resolve_capture_path(&capture.root, input)?;
	let output = rewritten_output_path(&capture.root, &input)?;
	let tool = LocalTool::new(&capture.rewrite_tool);
	let result = rewrite_capture(&tool, &input, &output, source, destination)?;
	Ok((output, result))
}
