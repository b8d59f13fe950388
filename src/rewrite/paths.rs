use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Directory under the capture root that holds rewritten captures.
pub const REWRITTEN_DIR: &str = "_rewritten";

/// Resolve a capture path against the storage root.
///
/// Relative paths are joined to `root`; absolute paths are taken as given.
/// Either way the result must stay inside `root` after `..` and symlinks
/// are resolved.
pub fn resolve_capture_path(root: &Path, requested: &Path) -> Result<PathBuf> {
	let root = resolve(root)?;
	let candidate = if requested.is_absolute() {
		resolve(requested)?
	} else {
		resolve(&root.join(requested))?
	};

	if candidate == root || !candidate.starts_with(&root) {
		return Err(Error::PathResolution {
			path: requested.to_path_buf(),
			root,
		});
	}
	Ok(candidate)
}

/// Output path mirroring `input`'s place under the root inside [`REWRITTEN_DIR`].
///
/// `{root}/dir/a.pcap` maps to `{root}/_rewritten/dir/a.pcap`. Missing parent
/// directories are created.
pub fn rewritten_output_path(root: &Path, input: &Path) -> Result<PathBuf> {
	let input = resolve_capture_path(root, input)?;
	let root = resolve(root)?;
	let relative = input.strip_prefix(&root).map_err(|_| Error::PathResolution {
		path: input.clone(),
		root: root.clone(),
	})?;

	let target = root.join(REWRITTEN_DIR).join(relative);
	if let Some(parent) = target.parent() {
		std::fs::create_dir_all(parent).map_err(|source| Error::Io {
			path: parent.to_path_buf(),
			source,
		})?;
	}
	Ok(target)
}

/// Make `path` absolute, fold `.` and `..` lexically, then canonicalize the
/// longest prefix that exists so symlinked directories compare correctly.
fn resolve(path: &Path) -> Result<PathBuf> {
	let absolute = std::path::absolute(path).map_err(|source| Error::Io {
		path: path.to_path_buf(),
		source,
	})?;
	let normalized = normalize(&absolute);

	let mut existing = normalized.as_path();
	let mut rest = Vec::new();
	loop {
		if let Ok(canonical) = existing.canonicalize() {
			return Ok(rest.iter().rev().fold(canonical, |acc, part| acc.join(part)));
		}
		match (existing.parent(), existing.file_name()) {
			(Some(parent), Some(name)) => {
				rest.push(name.to_os_string());
				existing = parent;
			}
			_ => return Ok(normalized),
		}
	}
}

fn normalize(path: &Path) -> PathBuf {
	let mut out = PathBuf::new();
	for component in path.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				out.pop();
			}
			other => out.push(other.as_os_str()),
		}
	}
	out
}
