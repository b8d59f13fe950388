//! pcapctl - control plane for a remote IDS sensor and local capture tooling.
//!
//! This library provides the core functionality for pcapctl, including:
//! - Authenticated remote command execution and file deployment over SSH
//! - Capability-probed rewriting of capture addresses with a single-pair fallback chain
//! - Sensor operations (log tailing, rule deployment, validation, reload, live capture)
//! - Local capture replay
//!
//! Every boundary operation returns a [`exec::CommandResult`] triple. Only
//! authentication failures and rejected paths or address maps surface as errors.
//!
//! # Example
//!
//! ```no_run
//! use pcapctl::exec::LocalTool;
//! use pcapctl::rewrite::{AddressRemap, Direction, rewrite_capture};
//! use std::path::Path;
//!
//! let tool = LocalTool::new("tcprewrite");
//! let source = AddressRemap::parse(Direction::Source, &["10.0.0.1=172.16.0.1"]).unwrap();
//! let destination = AddressRemap::new(Direction::Destination);
//!
//! let result = rewrite_capture(
//!     &tool,
//!     Path::new("in.pcap"),
//!     Path::new("out.pcap"),
//!     &source,
//!     &destination,
//! )
//! .unwrap();
//! println!("exit {}: {}", result.exit_code, result.stdout);
//! ```

pub mod config;
pub mod error;
pub mod exec;
pub mod ids;
pub mod remote;
pub mod replay;
pub mod rewrite;

pub use error::{Error, Result};
