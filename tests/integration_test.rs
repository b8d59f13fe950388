#![allow(deprecated)] // assert_cmd::Command::cargo_bin is deprecated but replacement requires nightly

use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

fn pcapctl_cmd() -> assert_cmd::Command {
	assert_cmd::Command::cargo_bin("pcapctl").unwrap()
}

/// Environment variables that would leak host settings into a test run.
const SETTINGS_VARS: &[&str] = &[
	"SURICATA_HOST",
	"SURICATA_USER",
	"SURICATA_SSH_KEY",
	"SURICATA_SSH_PASSPHRASE",
	"SURICATA_PASSWORD",
	"SURICATA_EVE",
	"SURICATA_FAST",
	"SURICATA_RULE_DIR",
	"SURICATA_LOCAL_RULE",
	"SURICATA_TEST_CMD",
	"SURICATA_RELOAD_CMD",
	"NIC_IFACE",
	"USE_SUDO_REPLAY",
	"PCAP_ROOT",
	"API_KEY",
	"GIT_WEBHOOK_TOKEN",
	"PCAPCTL_REWRITE_TOOL",
	"PCAPCTL_REPLAY_TOOL",
	"RUST_LOG",
];

/// A scratch capture root, config file, and fake rewrite tool.
struct Lab {
	dir: tempfile::TempDir,
	root: PathBuf,
	config: PathBuf,
}

impl Lab {
	fn new() -> Self {
		let dir = tempfile::tempdir().unwrap();
		let root = dir.path().join("pcaps");
		fs::create_dir_all(root.join("scans")).unwrap();
		fs::write(root.join("scans/syn.pcap"), b"\xd4\xc3\xb2\xa1fake capture").unwrap();
		let root = root.canonicalize().unwrap();

		let config = dir.path().join("pcapctl.toml");
		fs::write(
			&config,
			format!(
				"[capture]\nroot = \"{}\"\nrewrite-tool = \"{}\"\n",
				root.display(),
				dir.path().join("tcprewrite").display()
			),
		)
		.unwrap();

		Lab { dir, root, config }
	}

	fn cmd(&self) -> assert_cmd::Command {
		let mut cmd = pcapctl_cmd();
		for var in SETTINGS_VARS {
			cmd.env_remove(var);
		}
		cmd.env("HOME", self.dir.path())
			.env("XDG_CONFIG_HOME", self.dir.path().join(".config"))
			.arg("--config")
			.arg(&self.config);
		cmd
	}

	fn calls_log(&self) -> PathBuf {
		self.dir.path().join("tcprewrite.calls")
	}

	/// Invocations of the fake tool other than `--help`.
	fn calls(&self) -> Vec<String> {
		fs::read_to_string(self.calls_log())
			.map(|s| s.lines().map(str::to_string).collect())
			.unwrap_or_default()
	}

	fn rewritten(&self) -> PathBuf {
		self.root.join("_rewritten/scans/syn.pcap")
	}

	/// Install a fake rewrite tool that prints `help` for `--help` and
	/// otherwise copies `--infile` to `--outfile`.
	#[cfg(unix)]
	fn install_tool(&self, help: &str) {
		use std::os::unix::fs::PermissionsExt;

		let tool = self.dir.path().join("tcprewrite");
		let script = format!(
			r#"#!/bin/sh
if [ "$1" = "--help" ]; then
cat <<'HELP'
{help}
HELP
exit 0
fi
echo "$@" >> "{log}"
in=""
out=""
while [ $# -gt 0 ]; do
	case "$1" in
		--infile) in="$2"; shift 2 ;;
		--outfile) out="$2"; shift 2 ;;
		*) shift ;;
	esac
done
cp "$in" "$out"
"#,
			log = self.calls_log().display()
		);
		fs::write(&tool, script).unwrap();
		fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();
	}
}

const FULL_HELP: &str = "\
   -s, --srcipmap=str         Rewrite source IP addresses
   -d, --dstipmap=str         Rewrite destination IP addresses
   -N, --pnat=str             Rewrite IP addresses to be on a new network";

const PNAT_HELP: &str = "   -N, --pnat=str             Rewrite IP addresses to be on a new network";

const BARE_HELP: &str = "tcprewrite: usage: tcprewrite [options]";

fn leftover_temporaries(dir: &Path) -> usize {
	fs::read_dir(dir)
		.unwrap()
		.filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().starts_with(".rewrite-"))
		.count()
}

// ============================================================================
// CLI flag tests
// ============================================================================

#[test]
fn test_help_flag() {
	pcapctl_cmd()
		.arg("--help")
		.assert()
		.success()
		.stdout(predicate::str::contains("remote IDS sensor"))
		.stdout(predicate::str::contains("rewrite"));
}

#[test]
fn test_version_flag() {
	pcapctl_cmd()
		.arg("--version")
		.assert()
		.success()
		.stdout(predicate::str::contains("pcapctl"));
}

#[test]
fn test_no_args_shows_help() {
	pcapctl_cmd()
		.assert()
		.failure()
		.stderr(predicate::str::contains("Usage"));
}

// ============================================================================
// config subcommand tests
// ============================================================================

#[test]
fn test_config_validate_valid_config() {
	let lab = Lab::new();
	lab.cmd()
		.args(["config", "validate"])
		.assert()
		.success()
		.stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_config_validate_invalid_toml() {
	let lab = Lab::new();
	fs::write(&lab.config, "invalid toml [[[").unwrap();

	lab.cmd()
		.args(["config", "validate"])
		.assert()
		.failure()
		.stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_config_validate_rejects_zero_timeout() {
	let lab = Lab::new();
	fs::write(&lab.config, "[remote]\ncommand-timeout-secs = 0\n").unwrap();

	lab.cmd()
		.args(["config", "validate"])
		.assert()
		.failure()
		.stderr(predicate::str::contains("command-timeout-secs"));
}

#[test]
fn test_config_show_redacts_secrets() {
	let lab = Lab::new();
	fs::write(
		&lab.config,
		"[remote]\nhost = \"sensor.lab\"\npassword = \"hunter2\"\n",
	)
	.unwrap();

	lab.cmd()
		.args(["config", "show"])
		.assert()
		.success()
		.stdout(predicate::str::contains("host: sensor.lab"))
		.stdout(predicate::str::contains("password: (set)"))
		.stdout(predicate::str::contains("rule-path: /etc/suricata/rules/local.rules"))
		.stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn test_env_overrides_config_file() {
	let lab = Lab::new();
	lab.cmd()
		.env("SURICATA_HOST", "192.0.2.7")
		.env("NIC_IFACE", "ens9")
		.args(["config", "show"])
		.assert()
		.success()
		.stdout(predicate::str::contains("host: 192.0.2.7"))
		.stdout(predicate::str::contains("interface: ens9"));
}

// ============================================================================
// probe / rewrite tests (Unix only - these use a shell script tool)
// ============================================================================

#[cfg(unix)]
#[test]
fn test_probe_reports_capabilities() {
	let lab = Lab::new();
	lab.install_tool(PNAT_HELP);

	lab.cmd()
		.arg("probe")
		.assert()
		.success()
		.stdout(predicate::str::contains("bulk source map:      not supported"))
		.stdout(predicate::str::contains("single pair:          supported"));
}

#[cfg(unix)]
#[test]
fn test_rewrite_without_pairs_copies_input() {
	let lab = Lab::new();
	lab.install_tool(BARE_HELP);

	lab.cmd()
		.args(["rewrite", "scans/syn.pcap"])
		.assert()
		.success();

	assert_eq!(
		fs::read(lab.rewritten()).unwrap(),
		fs::read(lab.root.join("scans/syn.pcap")).unwrap()
	);
	let calls = lab.calls();
	assert_eq!(calls.len(), 1);
	assert!(!calls[0].contains("--pnat"));
}

#[cfg(unix)]
#[test]
fn test_rewrite_bulk_is_single_invocation() {
	let lab = Lab::new();
	lab.install_tool(FULL_HELP);

	lab.cmd()
		.args([
			"rewrite",
			"scans/syn.pcap",
			"--src",
			"10.0.0.1=172.16.0.1",
			"--src",
			"10.0.0.2=172.16.0.2",
			"--dst",
			"10.0.0.9=172.16.0.9",
		])
		.assert()
		.success();

	let calls = lab.calls();
	assert_eq!(calls.len(), 1);
	assert!(calls[0].contains("--srcipmap 10.0.0.1/32:172.16.0.1/32,10.0.0.2/32:172.16.0.2/32"));
	assert!(calls[0].contains("--dstipmap 10.0.0.9/32:172.16.0.9/32"));
	assert!(lab.rewritten().exists());
}

#[cfg(unix)]
#[test]
fn test_rewrite_pnat_chain() {
	let lab = Lab::new();
	lab.install_tool(PNAT_HELP);

	lab.cmd()
		.args([
			"rewrite",
			"scans/syn.pcap",
			"--src",
			"10.0.0.1=172.16.0.1",
			"--src",
			"10.0.0.2=172.16.0.2",
			"--dst",
			"10.0.0.9=172.16.0.9",
		])
		.assert()
		.success()
		.stdout(predicate::str::contains("pnat chain applied"));

	let calls = lab.calls();
	assert_eq!(calls.len(), 3);
	assert!(calls[0].contains("--pnat 10.0.0.1/32:172.16.0.1/32"));
	assert!(calls[1].contains("--pnat 10.0.0.2/32:172.16.0.2/32"));
	assert!(calls[2].contains("--pnat 10.0.0.9/32:172.16.0.9/32"));
	assert!(calls[2].contains(&format!("--outfile {}", lab.rewritten().display())));
	assert!(!calls[0].contains(&lab.rewritten().display().to_string()));

	assert!(lab.rewritten().exists());
	assert_eq!(leftover_temporaries(&lab.root.join("_rewritten/scans")), 0);
}

#[cfg(unix)]
#[test]
fn test_rewrite_single_pair_writes_final_directly() {
	let lab = Lab::new();
	lab.install_tool(PNAT_HELP);

	lab.cmd()
		.args(["rewrite", "scans/syn.pcap", "--src", "10.0.0.1=172.16.0.1"])
		.assert()
		.code(0);

	let calls = lab.calls();
	assert_eq!(calls.len(), 1);
	assert!(calls[0].contains(&format!("--outfile {}", lab.rewritten().display())));
}

#[cfg(unix)]
#[test]
fn test_rewrite_unsupported_invokes_nothing() {
	let lab = Lab::new();
	lab.install_tool(BARE_HELP);

	lab.cmd()
		.args(["rewrite", "scans/syn.pcap", "--dst", "10.0.0.9=172.16.0.9"])
		.assert()
		.code(1)
		.stderr(predicate::str::contains(
			"tcprewrite lacks srcipmap/dstipmap and pnat on this system",
		));

	assert!(lab.calls().is_empty());
	assert!(!lab.rewritten().exists());
}

#[cfg(unix)]
#[test]
fn test_rewrite_explicit_output_inside_root() {
	let lab = Lab::new();
	lab.install_tool(BARE_HELP);

	lab.cmd()
		.args(["rewrite", "scans/syn.pcap", "--output", "custom/out.pcap"])
		.assert()
		.success();

	assert!(lab.root.join("custom/out.pcap").exists());
}

#[cfg(unix)]
#[test]
fn test_rewrite_rejects_paths_outside_root() {
	let lab = Lab::new();
	lab.install_tool(FULL_HELP);
	let outside = lab.dir.path().join("outside.pcap");
	fs::write(&outside, b"x").unwrap();

	lab.cmd()
		.args(["rewrite", outside.to_str().unwrap()])
		.assert()
		.failure()
		.stderr(predicate::str::contains("outside the capture root"));

	lab.cmd()
		.args(["rewrite", "scans/syn.pcap", "--output", "../escape.pcap"])
		.assert()
		.failure()
		.stderr(predicate::str::contains("outside the capture root"));

	assert!(lab.calls().is_empty());
	assert!(!lab.dir.path().join("escape.pcap").exists());
}

#[test]
fn test_rewrite_rejects_conflicting_pairs() {
	let lab = Lab::new();
	lab.cmd()
		.args([
			"rewrite",
			"scans/syn.pcap",
			"--src",
			"10.0.0.1=172.16.0.1",
			"--src",
			"10.0.0.1=172.16.0.2",
		])
		.assert()
		.failure()
		.stderr(predicate::str::contains("already mapped"));
}

#[test]
fn test_rewrite_missing_tool_is_not_found() {
	let lab = Lab::new();
	// No tool installed: the configured path does not exist.
	lab.cmd()
		.args(["rewrite", "scans/syn.pcap"])
		.assert()
		.code(127);
}

// ============================================================================
// replay / remote tests
// ============================================================================

#[cfg(unix)]
#[test]
fn test_replay_runs_configured_tool() {
	let lab = Lab::new();
	lab.cmd()
		.env("PCAPCTL_REPLAY_TOOL", "/bin/echo")
		.args(["replay", "scans/syn.pcap", "--rate", "5", "--loop", "3"])
		.assert()
		.success()
		.stdout(predicate::str::contains("--mbps=5 --intf1 eth0 --loop 3"))
		.stdout(predicate::str::contains("scans/syn.pcap"));
}

#[test]
fn test_replay_rejects_path_outside_root() {
	let lab = Lab::new();
	lab.cmd()
		.args(["replay", "../../etc/passwd"])
		.assert()
		.failure()
		.stderr(predicate::str::contains("outside the capture root"));
}

#[test]
fn test_remote_unreachable_returns_failure_triple() {
	let port = std::net::TcpListener::bind("127.0.0.1:0")
		.unwrap()
		.local_addr()
		.unwrap()
		.port();
	let lab = Lab::new();

	lab.cmd()
		.env("SURICATA_HOST", format!("127.0.0.1:{port}"))
		.env("SURICATA_SSH_KEY", "")
		.env("SURICATA_PASSWORD", "pw")
		.args(["run", "uptime"])
		.assert()
		.code(1)
		.stderr(predicate::str::contains("Failed to connect"));
}
