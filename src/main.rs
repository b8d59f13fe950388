use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use pcapctl::config::{Settings, load_settings, user_config_path};
use pcapctl::exec::{CommandResult, LocalTool, resolve_command};
use pcapctl::ids::{CaptureRequest, IdsControl, LogFile};
use pcapctl::replay::{ReplayRequest, replay_capture};
use pcapctl::rewrite::{
	AddressRemap, Direction, probe, resolve_capture_path, rewrite_capture, rewrite_managed,
};

#[derive(Parser)]
#[command(name = "pcapctl")]
#[command(
	author,
	version,
	about = "Drive a remote IDS sensor and rewrite or replay local captures"
)]
#[command(arg_required_else_help = true)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	/// Settings file to use instead of the user config
	#[arg(long, global = true, value_name = "FILE")]
	config: Option<PathBuf>,

	/// Increase log verbosity (-v debug, -vv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
	/// Run a shell command on the sensor
	Run {
		/// Seconds before the command is abandoned
		#[arg(long)]
		timeout: Option<u64>,

		/// Command line, passed to the remote shell as is
		#[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
		command: Vec<String>,
	},

	/// Show the end of a sensor log
	Tail {
		/// Which configured log to read
		#[arg(long, value_enum, default_value = "fast")]
		log: LogFile,

		/// Read this remote path instead of a configured log
		#[arg(long)]
		path: Option<String>,

		/// Only lines matching this pattern (case-insensitive)
		#[arg(long)]
		grep: Option<String>,

		/// Number of lines
		#[arg(short = 'n', long, default_value_t = 100)]
		lines: u32,
	},

	/// Replace the sensor's local rule file
	DeployRules {
		/// Rule file to upload, or `-` for stdin
		file: PathBuf,
	},

	/// Check the deployed rules with the configured test command
	ValidateRules,

	/// Reload the IDS service
	Reload,

	/// Capture packets on the sensor for a bounded time
	Capture {
		/// Sensor interface to capture on
		#[arg(long)]
		interface: String,

		/// Only packets to or from this host
		#[arg(long)]
		host: String,

		/// Stop after this many packets
		#[arg(long, default_value_t = 20)]
		count: u32,

		/// Stop after this many seconds
		#[arg(long, default_value_t = 5)]
		duration: u64,
	},

	/// Report which address rewriting features the rewrite tool supports
	Probe,

	/// Rewrite capture addresses into the rewritten tree
	Rewrite {
		/// Capture file, absolute or relative to the capture root
		input: PathBuf,

		/// Source address pair OLD=NEW (repeatable)
		#[arg(long = "src", value_name = "OLD=NEW")]
		source: Vec<String>,

		/// Destination address pair OLD=NEW (repeatable)
		#[arg(long = "dst", value_name = "OLD=NEW")]
		destination: Vec<String>,

		/// Output path inside the capture root (default: mirrored under _rewritten)
		#[arg(long)]
		output: Option<PathBuf>,
	},

	/// Replay a capture onto a local interface
	Replay {
		/// Capture file, absolute or relative to the capture root
		capture: PathBuf,

		/// Interface to send on (default: configured interface)
		#[arg(long)]
		interface: Option<String>,

		/// Rate in Mbps
		#[arg(long)]
		rate: Option<String>,

		/// Number of times to replay
		#[arg(long = "loop", default_value_t = 1)]
		loops: u32,
	},

	/// Configuration management commands
	Config {
		#[command(subcommand)]
		action: ConfigAction,
	},
}

#[derive(Subcommand)]
enum ConfigAction {
	/// Display the effective configuration
	Show,
	/// Check the configuration for errors without running anything
	Validate,
}

fn main() -> ExitCode {
	match run() {
		Ok(code) => code,
		Err(e) => {
			eprintln!("error: {e:?}");
			ExitCode::FAILURE
		}
	}
}

fn run() -> Result<ExitCode> {
	let cli = Cli::parse();
	init_tracing(cli.verbose);

	let config = cli.config.as_deref();
	if let Commands::Config {
		action: ConfigAction::Validate,
	} = cli.command
	{
		return handle_config_validate(config);
	}

	let settings = load_settings(config).context("Failed to load configuration")?;

	match cli.command {
		Commands::Run { timeout, command } => handle_run(&settings, &command.join(" "), timeout),
		Commands::Tail {
			log,
			path,
			grep,
			lines,
		} => {
			let path = path.unwrap_or_else(|| log.path(&settings.remote).to_string());
			let result = IdsControl::new(&settings.remote)
				.tail_log(&path, grep.as_deref(), lines)
				.context("Failed to tail remote log")?;
			Ok(report(result))
		}
		Commands::DeployRules { file } => handle_deploy_rules(&settings, &file),
		Commands::ValidateRules => {
			let result = IdsControl::new(&settings.remote)
				.validate_rules()
				.context("Failed to validate rules")?;
			Ok(report(result))
		}
		Commands::Reload => {
			let result = IdsControl::new(&settings.remote)
				.reload()
				.context("Failed to reload IDS")?;
			Ok(report(result))
		}
		Commands::Capture {
			interface,
			host,
			count,
			duration,
		} => {
			let request = CaptureRequest {
				interface,
				host,
				count,
				duration_secs: duration,
			};
			let result = IdsControl::new(&settings.remote)
				.capture(&request)
				.context("Failed to capture on sensor")?;
			Ok(report(result))
		}
		Commands::Probe => handle_probe(&settings),
		Commands::Rewrite {
			input,
			source,
			destination,
			output,
		} => handle_rewrite(&settings, &input, &source, &destination, output.as_deref()),
		Commands::Replay {
			capture,
			interface,
			rate,
			loops,
		} => {
			let request = ReplayRequest {
				capture,
				interface,
				rate,
				loops,
			};
			let result = replay_capture(&settings.capture, &request)
				.context("Failed to replay capture")?;
			Ok(report(result))
		}
		Commands::Config { action } => match action {
			ConfigAction::Show => handle_config_show(&settings),
			ConfigAction::Validate => handle_config_validate(config),
		},
	}
}

/// Log to stderr, filtered by `RUST_LOG` unless `-v` was given.
fn init_tracing(verbose: u8) {
	let filter = match verbose {
		0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pcapctl=info")),
		1 => EnvFilter::new("pcapctl=debug"),
		_ => EnvFilter::new("pcapctl=trace"),
	};
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(std::io::stderr().is_terminal())
		.init();
}

/// Print a result triple and turn its exit code into the process exit code.
fn report(result: CommandResult) -> ExitCode {
	print!("{}", result.stdout);
	if !result.stdout.is_empty() && !result.stdout.ends_with('\n') {
		println!();
	}
	eprint!("{}", result.stderr);
	if !result.stderr.is_empty() && !result.stderr.ends_with('\n') {
		eprintln!();
	}
	match u8::try_from(result.exit_code) {
		Ok(code) => ExitCode::from(code),
		Err(_) => ExitCode::FAILURE,
	}
}

fn handle_run(settings: &Settings, command: &str, timeout: Option<u64>) -> Result<ExitCode> {
	let mut remote = settings.remote.clone();
	if let Some(seconds) = timeout {
		remote.command_timeout_secs = seconds.max(1);
	}
	let result = IdsControl::new(&remote)
		.run(command)
		.with_context(|| format!("Failed to run remote command: {command}"))?;
	Ok(report(result))
}

fn handle_deploy_rules(settings: &Settings, file: &Path) -> Result<ExitCode> {
	let content = if file == Path::new("-") {
		let mut buf = String::new();
		std::io::stdin()
			.read_to_string(&mut buf)
			.context("Failed to read rules from stdin")?;
		buf
	} else {
		std::fs::read_to_string(file)
			.with_context(|| format!("Failed to read {}", file.display()))?
	};

	let result = IdsControl::new(&settings.remote)
		.deploy_rules(&content)
		.context("Failed to deploy rules")?;
	if result.success() {
		println!("Deployed {} bytes to {}", content.len(), settings.remote.rule_path());
	}
	Ok(report(result))
}

fn handle_probe(settings: &Settings) -> Result<ExitCode> {
	let tool = LocalTool::new(&settings.capture.rewrite_tool).with_timeout(Duration::from_secs(10));
	let capabilities = probe(&tool);

	let label = |supported: bool| if supported { "supported" } else { "not supported" };
	let tool_name = settings.capture.rewrite_tool.to_string_lossy();
	match resolve_command(&tool_name) {
		Some(path) => println!("Rewrite tool: {}", path.display()),
		None => println!("Rewrite tool: {} (not found)", tool_name),
	}
	println!("  bulk source map:      {}", label(capabilities.bulk_source_map));
	println!("  bulk destination map: {}", label(capabilities.bulk_dest_map));
	println!("  single pair:          {}", label(capabilities.single_pair));
	Ok(ExitCode::SUCCESS)
}

fn handle_rewrite(
	settings: &Settings,
	input: &Path,
	source: &[String],
	destination: &[String],
	output: Option<&Path>,
) -> Result<ExitCode> {
	let source = AddressRemap::parse(Direction::Source, source).context("Invalid --src pair")?;
	let destination =
		AddressRemap::parse(Direction::Destination, destination).context("Invalid --dst pair")?;

	let (output, result) = match output {
		Some(output) => {
			let root = &settings.capture.root;
			let input = resolve_capture_path(root, input).context("Rejected input path")?;
			let output = resolve_capture_path(root, output).context("Rejected output path")?;
			if let Some(parent) = output.parent() {
				std::fs::create_dir_all(parent)
					.with_context(|| format!("Failed to create {}", parent.display()))?;
			}
			let tool = LocalTool::new(&settings.capture.rewrite_tool);
			let result = rewrite_capture(&tool, &input, &output, &source, &destination)
				.context("Failed to rewrite capture")?;
			(output, result)
		}
		None => rewrite_managed(&settings.capture, input, &source, &destination)
			.context("Failed to rewrite capture")?,
	};

	if result.success() {
		tracing::info!(output = %output.display(), "capture rewritten");
	}
	Ok(report(result))
}

fn handle_config_show(settings: &Settings) -> Result<ExitCode> {
	let redact = |secret: &Option<String>| match secret {
		Some(s) if !s.is_empty() => "(set)",
		_ => "(not set)",
	};
	let remote = &settings.remote;
	let capture = &settings.capture;

	println!("[remote]");
	println!("host: {}", remote.host);
	println!("user: {}", remote.user);
	match &remote.key_path {
		Some(path) => println!("key-path: {}", path.display()),
		None => println!("key-path: (not set)"),
	}
	println!("passphrase: {}", redact(&remote.passphrase));
	println!("password: {}", redact(&remote.password));
	println!("fast-log: {}", remote.fast_log);
	println!("eve-log: {}", remote.eve_log);
	println!("rule-path: {}", remote.rule_path());
	println!("test-command: {}", remote.test_command);
	println!("reload-command: {}", remote.reload_command);
	println!("connect-timeout-secs: {}", remote.connect_timeout_secs);
	println!("command-timeout-secs: {}", remote.command_timeout_secs);
	println!("capture-grace-secs: {}", remote.capture_grace_secs);
	println!();
	println!("[capture]");
	println!("root: {}", capture.root.display());
	println!("interface: {}", capture.interface);
	println!("sudo-replay: {}", capture.sudo_replay);
	println!("rewrite-tool: {}", capture.rewrite_tool.display());
	println!("replay-tool: {}", capture.replay_tool.display());
	println!();

	if let Ok(user_path) = user_config_path() {
		println!("User config path: {}", user_path.display());
		if user_path.exists() {
			println!("  (exists)");
		} else {
			println!("  (not found)");
		}
	}

	Ok(ExitCode::SUCCESS)
}

fn handle_config_validate(config: Option<&Path>) -> Result<ExitCode> {
	match load_settings(config) {
		Ok(settings) => {
			println!("Configuration is valid.");
			println!("  remote: {}@{}", settings.remote.user, settings.remote.host);
			println!("  capture root: {}", settings.capture.root.display());
			Ok(ExitCode::SUCCESS)
		}
		Err(e) => {
			eprintln!("Configuration error: {}", e);
			Ok(ExitCode::FAILURE)
		}
	}
}
