use crate::rewrite::probe::{Capabilities, DST_MAP_FLAG, PNAT_FLAG, SRC_MAP_FLAG};
use crate::rewrite::remap::{AddressRemap, format_pair};
use std::net::Ipv4Addr;
use std::path::Path;

/// How a rewrite request will be carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
	/// One invocation carrying a bulk map for each supported, non-empty direction.
	BulkMultiMap {
		source_map: Option<String>,
		destination_map: Option<String>,
	},

	/// One single-pair invocation per requested pair, source pairs first.
	SequentialChain { pairs: Vec<(Ipv4Addr, Ipv4Addr)> },

	/// No pairs requested: copy input to output unchanged.
	Passthrough,

	/// Pairs requested but the tool cannot remap them. Nothing is invoked.
	Unsupported,
}

impl Strategy {
	pub fn name(&self) -> &'static str {
		match self {
			Strategy::BulkMultiMap { .. } => "bulk-multi-map",
			Strategy::SequentialChain { .. } => "sequential-chain",
			Strategy::Passthrough => "passthrough",
			Strategy::Unsupported => "unsupported",
		}
	}

	/// The steps this strategy runs, or `None` when it runs nothing.
	pub fn plan(&self) -> Option<RewritePlan> {
		let operations = match self {
			Strategy::BulkMultiMap {
				source_map,
				destination_map,
			} => vec![Operation::BulkMultiMap {
				source_map: source_map.clone(),
				destination_map: destination_map.clone(),
			}],
			Strategy::SequentialChain { pairs } => pairs
				.iter()
				.map(|&(original, replacement)| Operation::SinglePairTranslate {
					original,
					replacement,
				})
				.collect(),
			Strategy::Passthrough => vec![Operation::Passthrough],
			Strategy::Unsupported => return None,
		};
		RewritePlan::new(operations)
	}
}

/// Choose a strategy from the probed capabilities and the requested maps.
///
/// Pure: performs no I/O and depends only on its arguments.
pub fn select_strategy(capabilities: &Capabilities, source: &AddressRemap, destination: &AddressRemap) -> Strategy {
	if source.is_empty() && destination.is_empty() {
		return Strategy::Passthrough;
	}

	let bulk_source = capabilities.bulk_source_map && !source.is_empty();
	let bulk_destination = capabilities.bulk_dest_map && !destination.is_empty();
	if bulk_source || bulk_destination {
		return Strategy::BulkMultiMap {
			source_map: bulk_source.then(|| source.bulk_argument()),
			destination_map: bulk_destination.then(|| destination.bulk_argument()),
		};
	}

	if capabilities.single_pair {
		let pairs = source
			.pairs()
			.iter()
			.chain(destination.pairs())
			.copied()
			.collect();
		return Strategy::SequentialChain { pairs };
	}

	Strategy::Unsupported
}

/// One tool operation within a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
	BulkMultiMap {
		source_map: Option<String>,
		destination_map: Option<String>,
	},
	SinglePairTranslate {
		original: Ipv4Addr,
		replacement: Ipv4Addr,
	},
	Passthrough,
}

impl Operation {
	/// Arguments for one invocation reading `input` and writing `output`.
	pub fn args(&self, input: &Path, output: &Path) -> Vec<String> {
		let mut args = vec![
			"--infile".to_string(),
			input.to_string_lossy().to_string(),
			"--outfile".to_string(),
			output.to_string_lossy().to_string(),
		];
		match self {
			Operation::BulkMultiMap {
				source_map,
				destination_map,
			} => {
				if let Some(map) = source_map {
					args.extend([SRC_MAP_FLAG.to_string(), map.clone()]);
				}
				if let Some(map) = destination_map {
					args.extend([DST_MAP_FLAG.to_string(), map.clone()]);
				}
			}
			Operation::SinglePairTranslate {
				original,
				replacement,
			} => {
				args.extend([PNAT_FLAG.to_string(), format_pair(*original, *replacement)]);
			}
			Operation::Passthrough => {}
		}
		args
	}
}

/// Where a step writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutput {
	/// A fresh, uniquely named intermediate file.
	Temporary,

	/// The caller's requested output path.
	Final,
}

/// An operation and the kind of file it writes. Each step reads the
/// previous step's output; the first reads the original input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteStep {
	pub operation: Operation,
	pub output: StepOutput,
}

/// A non-empty sequence of steps whose last, and only last, step writes the final output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewritePlan {
	steps: Vec<RewriteStep>,
}

impl RewritePlan {
	/// Build a plan from operations. Returns `None` for an empty list.
	pub fn new(operations: Vec<Operation>) -> Option<Self> {
		if operations.is_empty() {
			return None;
		}
		let last = operations.len() - 1;
		let steps = operations
			.into_iter()
			.enumerate()
			.map(|(i, operation)| RewriteStep {
				operation,
				output: if i == last {
					StepOutput::Final
				} else {
					StepOutput::Temporary
				},
			})
			.collect();
		Some(RewritePlan { steps })
	}

	pub fn steps(&self) -> &[RewriteStep] {
		&self.steps
	}

	pub fn len(&self) -> usize {
		self.steps.len()
	}

	pub fn is_empty(&self) -> bool {
		self.steps.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::rewrite::remap::Direction;

	fn ip(s: &str) -> Ipv4Addr {
		s.parse().unwrap()
	}

	fn source(entries: &[&str]) -> AddressRemap {
		AddressRemap::parse(Direction::Source, entries).unwrap()
	}

	fn destination(entries: &[&str]) -> AddressRemap {
		AddressRemap::parse(Direction::Destination, entries).unwrap()
	}

	const ALL: Capabilities = Capabilities {
		bulk_source_map: true,
		bulk_dest_map: true,
		single_pair: true,
	};

	const PNAT_ONLY: Capabilities = Capabilities {
		bulk_source_map: false,
		bulk_dest_map: false,
		single_pair: true,
	};

	const NOTHING: Capabilities = Capabilities {
		bulk_source_map: false,
		bulk_dest_map: false,
		single_pair: false,
	};

	#[test]
	fn test_no_pairs_is_passthrough_regardless_of_capabilities() {
		for caps in [ALL, PNAT_ONLY, NOTHING] {
			assert_eq!(
				select_strategy(&caps, &source(&[]), &destination(&[])),
				Strategy::Passthrough
			);
		}
	}

	#[test]
	fn test_bulk_both_directions() {
		let strategy = select_strategy(
			&ALL,
			&source(&["10.0.0.1=172.16.0.1", "10.0.0.2=172.16.0.2"]),
			&destination(&["10.0.0.9=172.16.0.9"]),
		);
		assert_eq!(
			strategy,
			Strategy::BulkMultiMap {
				source_map: Some("10.0.0.1/32:172.16.0.1/32,10.0.0.2/32:172.16.0.2/32".to_string()),
				destination_map: Some("10.0.0.9/32:172.16.0.9/32".to_string()),
			}
		);
		assert_eq!(strategy.plan().unwrap().len(), 1);
	}

	#[test]
	fn test_bulk_skips_unsupported_direction() {
		let caps = Capabilities {
			bulk_source_map: true,
			bulk_dest_map: false,
			single_pair: true,
		};
		let strategy = select_strategy(
			&caps,
			&source(&["10.0.0.1=172.16.0.1"]),
			&destination(&["10.0.0.9=172.16.0.9"]),
		);
		assert_eq!(
			strategy,
			Strategy::BulkMultiMap {
				source_map: Some("10.0.0.1/32:172.16.0.1/32".to_string()),
				destination_map: None,
			}
		);
	}

	#[test]
	fn test_bulk_flag_for_empty_direction_does_not_apply() {
		let caps = Capabilities {
			bulk_source_map: true,
			bulk_dest_map: false,
			single_pair: true,
		};
		let strategy = select_strategy(&caps, &source(&[]), &destination(&["10.0.0.9=172.16.0.9"]));
		assert_eq!(
			strategy,
			Strategy::SequentialChain {
				pairs: vec![(ip("10.0.0.9"), ip("172.16.0.9"))],
			}
		);
	}

	#[test]
	fn test_chain_orders_source_then_destination() {
		let strategy = select_strategy(
			&PNAT_ONLY,
			&source(&["10.0.0.2=172.16.0.2", "10.0.0.1=172.16.0.1"]),
			&destination(&["10.0.0.9=172.16.0.9"]),
		);
		assert_eq!(
			strategy,
			Strategy::SequentialChain {
				pairs: vec![
					(ip("10.0.0.2"), ip("172.16.0.2")),
					(ip("10.0.0.1"), ip("172.16.0.1")),
					(ip("10.0.0.9"), ip("172.16.0.9")),
				],
			}
		);

		let plan = strategy.plan().unwrap();
		let outputs: Vec<_> = plan.steps().iter().map(|s| s.output).collect();
		assert_eq!(
			outputs,
			[StepOutput::Temporary, StepOutput::Temporary, StepOutput::Final]
		);
	}

	#[test]
	fn test_unsupported_has_no_plan() {
		let strategy = select_strategy(&NOTHING, &source(&["10.0.0.1=172.16.0.1"]), &destination(&[]));
		assert_eq!(strategy, Strategy::Unsupported);
		assert!(strategy.plan().is_none());
	}

	#[test]
	fn test_single_step_plan_writes_final() {
		let plan = Strategy::Passthrough.plan().unwrap();
		assert_eq!(plan.len(), 1);
		assert_eq!(plan.steps()[0].output, StepOutput::Final);
		assert!(RewritePlan::new(Vec::new()).is_none());
	}

	#[test]
	fn test_operation_args() {
		let input = Path::new("/pcaps/in.pcap");
		let output = Path::new("/pcaps/_rewritten/in.pcap");

		assert_eq!(
			Operation::Passthrough.args(input, output),
			[
				"--infile",
				"/pcaps/in.pcap",
				"--outfile",
				"/pcaps/_rewritten/in.pcap"
			]
		);

		let pnat = Operation::SinglePairTranslate {
			original: ip("10.0.0.1"),
			replacement: ip("172.16.0.1"),
		};
		assert_eq!(
			&pnat.args(input, output)[4..],
			["--pnat", "10.0.0.1/32:172.16.0.1/32"]
		);

		let bulk = Operation::BulkMultiMap {
			source_map: None,
			destination_map: Some("10.0.0.9/32:172.16.0.9/32".to_string()),
		};
		assert_eq!(
			&bulk.args(input, output)[4..],
			["--dstipmap", "10.0.0.9/32:172.16.0.9/32"]
		);
	}
}
