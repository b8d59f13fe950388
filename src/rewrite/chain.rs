use crate::error::{Error, Result};
use crate::exec::{CommandResult, ToolRunner};
use crate::rewrite::strategy::{Operation, RewritePlan, StepOutput};
use std::path::{Path, PathBuf};

/// Prefix of intermediate chain files.
const TEMP_PREFIX: &str = ".rewrite-";

/// Run every step of `plan`, feeding each step's output into the next.
///
/// Intermediate files are allocated next to `output` with unique names.
/// The first step with a non-zero exit ends the run and its result is
/// returned as is; files written by earlier steps are left in place.
/// After a complete multi-step run the intermediates are removed.
pub fn execute_plan<R: ToolRunner + ?Sized>(
	tool: &R,
	plan: &RewritePlan,
	input: &Path,
	output: &Path,
) -> Result<CommandResult> {
	let mut current_input = input.to_path_buf();
	let mut intermediates: Vec<PathBuf> = Vec::new();
	let mut last = CommandResult::default();

	for (index, step) in plan.steps().iter().enumerate() {
		let step_output = match step.output {
			StepOutput::Final => output.to_path_buf(),
			StepOutput::Temporary => {
				let path = allocate_temporary(output)?;
				intermediates.push(path.clone());
				path
			}
		};

		let args = step.operation.args(&current_input, &step_output);
		tracing::debug!(
			step = index + 1,
			of = plan.len(),
			output = %step_output.display(),
			"running rewrite step"
		);
		last = match tool.run(&args) {
			Ok(result) => result,
			Err(e) => {
				if !intermediates.is_empty() {
					tracing::warn!(
						step = index + 1,
						error = %e,
						leftover = ?intermediates,
						"rewrite chain aborted; intermediate files left in place"
					);
				}
				return Err(e);
			}
		};

		if !last.success() {
			if !intermediates.is_empty() {
				tracing::warn!(
					step = index + 1,
					exit_code = last.exit_code,
					leftover = ?intermediates,
					"rewrite chain aborted; intermediate files left in place"
				);
			}
			return Ok(last);
		}
		current_input = step_output;
	}

	let chained = plan
		.steps()
		.iter()
		.all(|step| matches!(step.operation, Operation::SinglePairTranslate { .. }));
	if !chained {
		return Ok(last);
	}

	for path in &intermediates {
		if let Err(e) = std::fs::remove_file(path) {
			tracing::warn!(path = %path.display(), error = %e, "failed to remove intermediate file");
		}
	}
	Ok(CommandResult::new(0, "pnat chain applied", ""))
}

/// Create an empty, uniquely named file in the output's directory.
///
/// Uniqueness comes from the filesystem's exclusive create, so concurrent
/// chains writing into the same directory never collide.
fn allocate_temporary(output: &Path) -> Result<PathBuf> {
	let dir = match output.parent() {
		Some(parent) if !parent.as_os_str().is_empty() => parent,
		_ => Path::new("."),
	};
	let file = tempfile::Builder::new()
		.prefix(TEMP_PREFIX)
		.suffix(".pcap")
		.tempfile_in(dir)
		.map_err(|source| Error::Io {
			path: dir.to_path_buf(),
			source,
		})?;
	file.keep().map(|(_, path)| path).map_err(|e| Error::Io {
		path: dir.to_path_buf(),
		source: e.error,
	})
}
