use crate::error::{Error, Result};
use crate::exec::CommandResult;
use ssh2::{FileStat, OpenFlags, OpenType, Sftp};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Permissions of deployed files: owner read-write, group read, others none.
pub const DEPLOYED_FILE_MODE: u32 = 0o640;

/// Permissions of directories created on the way to a deployed file.
pub const CREATED_DIR_MODE: i32 = 0o755;

/// The file operations the deployer needs from a remote filesystem.
pub trait RemoteFs {
	fn is_dir(&self, path: &Path) -> bool;
	fn make_dir(&self, path: &Path, mode: i32) -> Result<()>;

	/// Create or truncate `path` and write `contents` in full.
	fn put(&self, path: &Path, contents: &[u8]) -> Result<()>;
	fn chmod(&self, path: &Path, mode: u32) -> Result<()>;
}

/// Write `contents` to the absolute `remote_path`, creating missing parent
/// directories and restricting permissions to [`DEPLOYED_FILE_MODE`].
pub fn write_remote_file<F: RemoteFs>(fs: &F, remote_path: &Path, contents: &[u8]) -> Result<CommandResult> {
	if let Some(dir) = remote_path.parent()
		&& !dir.as_os_str().is_empty()
		&& !fs.is_dir(dir)
	{
		for prefix in dir_chain(dir) {
			// Existing components fail to create; a real failure surfaces at write time.
			if let Err(e) = fs.make_dir(&prefix, CREATED_DIR_MODE) {
				tracing::debug!(dir = %prefix.display(), error = %e, "mkdir skipped");
			}
		}
	}

	fs.put(remote_path, contents)?;
	fs.chmod(remote_path, DEPLOYED_FILE_MODE)?;
	tracing::info!(path = %remote_path.display(), bytes = contents.len(), "remote file written");

	Ok(CommandResult::new(0, "", ""))
}

/// Every prefix of `dir`, shortest first: `/a/b` yields `/a`, `/a/b`.
fn dir_chain(dir: &Path) -> Vec<PathBuf> {
	let mut current = PathBuf::new();
	let mut chain = Vec::new();
	for component in dir.components() {
		current.push(component);
		if matches!(component, Component::Normal(_) | Component::ParentDir) {
			chain.push(current.clone());
		}
	}
	chain
}

impl RemoteFs for Sftp {
	fn is_dir(&self, path: &Path) -> bool {
		self.stat(path).map(|stat| stat.is_dir()).unwrap_or(false)
	}

	fn make_dir(&self, path: &Path, mode: i32) -> Result<()> {
		self.mkdir(path, mode).map_err(|source| Error::Sftp {
			context: "mkdir",
			path: path.display().to_string(),
			source,
		})
	}

	fn put(&self, path: &Path, contents: &[u8]) -> Result<()> {
		let mut file = self
			.open_mode(
				path,
				OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
				DEPLOYED_FILE_MODE as i32,
				OpenType::File,
			)
			.map_err(|source| Error::Sftp {
				context: "open",
				path: path.display().to_string(),
				source,
			})?;
		file.write_all(contents).map_err(|source| Error::Io {
			path: path.to_path_buf(),
			source,
		})?;
		// Not every server implements the fsync extension.
		if let Err(e) = file.fsync() {
			tracing::debug!(path = %path.display(), error = %e, "sftp fsync unsupported");
		}
		Ok(())
	}

	fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
		let stat = FileStat {
			size: None,
			uid: None,
			gid: None,
			perm: Some(mode),
			atime: None,
			mtime: None,
		};
		self.setstat(path, stat).map_err(|source| Error::Sftp {
			context: "chmod",
			path: path.display().to_string(),
			source,
		})
	}
}
