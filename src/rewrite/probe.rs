use crate::exec::ToolRunner;
use regex::Regex;

/// Bulk source-address map flag.
pub const SRC_MAP_FLAG: &str = "--srcipmap";

/// Bulk destination-address map flag.
pub const DST_MAP_FLAG: &str = "--dstipmap";

/// Single pair translation flag.
pub const PNAT_FLAG: &str = "--pnat";

/// Address remapping features exposed by the installed rewrite tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
	pub bulk_source_map: bool,
	pub bulk_dest_map: bool,
	pub single_pair: bool,
}

impl Capabilities {
	/// Detect features from the tool's usage text.
	pub fn from_help(help: &str) -> Self {
		Capabilities {
			bulk_source_map: flag_present(help, SRC_MAP_FLAG),
			bulk_dest_map: flag_present(help, DST_MAP_FLAG),
			single_pair: flag_present(help, PNAT_FLAG),
		}
	}
}

/// Ask the rewrite tool for its usage text and check which flags it lists.
///
/// Runs on every call; nothing is cached. A tool that cannot be run
/// supports nothing.
pub fn probe<R: ToolRunner + ?Sized>(tool: &R) -> Capabilities {
	match tool.run(&["--help".to_string()]) {
		Ok(result) => {
			let capabilities = Capabilities::from_help(&format!("{}\n{}", result.stdout, result.stderr));
			tracing::debug!(?capabilities, "probed rewrite tool");
			capabilities
		}
		Err(e) => {
			tracing::warn!(error = %e, "rewrite tool probe failed");
			Capabilities::default()
		}
	}
}

/// Whether `flag` appears as a whole option name, so `--pnat` does not match `--pnatx`.
fn flag_present(help: &str, flag: &str) -> bool {
	let pattern = format!(r"(?:^|[^\w-]){}(?:[^\w-]|$)", regex::escape(flag));
	match Regex::new(&pattern) {
		Ok(re) => re.is_match(help),
		Err(_) => help.contains(flag),
	}
}
