use crate::error::{Error, Result};
use std::fmt;
use std::net::Ipv4Addr;

/// Which address field of each packet a remap applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
	Source,
	Destination,
}

impl fmt::Display for Direction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Direction::Source => f.write_str("source"),
			Direction::Destination => f.write_str("destination"),
		}
	}
}

/// Ordered original-to-replacement IPv4 mapping for one direction.
///
/// Each original address appears at most once; insertion order is kept.
/// An empty remap leaves its direction untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRemap {
	direction: Direction,
	pairs: Vec<(Ipv4Addr, Ipv4Addr)>,
}

impl AddressRemap {
	pub fn new(direction: Direction) -> Self {
		AddressRemap {
			direction,
			pairs: Vec::new(),
		}
	}

	pub fn from_pairs<I>(direction: Direction, pairs: I) -> Result<Self>
	where
		I: IntoIterator<Item = (Ipv4Addr, Ipv4Addr)>,
	{
		let mut remap = AddressRemap::new(direction);
		for (original, replacement) in pairs {
			remap.insert(original, replacement)?;
		}
		Ok(remap)
	}

	/// Parse entries of the form `OLD=NEW` (or `OLD:NEW`).
	pub fn parse<S: AsRef<str>>(direction: Direction, entries: &[S]) -> Result<Self> {
		let mut remap = AddressRemap::new(direction);
		for entry in entries {
			let (original, replacement) = parse_entry(entry.as_ref())?;
			remap.insert(original, replacement)?;
		}
		Ok(remap)
	}

	/// Add a pair. Repeating an identical pair is a no-op; mapping the same
	/// original to a different replacement is rejected.
	pub fn insert(&mut self, original: Ipv4Addr, replacement: Ipv4Addr) -> Result<()> {
		match self.pairs.iter().find(|(existing, _)| *existing == original) {
			Some((_, current)) if *current == replacement => Ok(()),
			Some((_, current)) => Err(Error::InvalidRemap {
				entry: format!("{original}={replacement}"),
				reason: format!(
					"{} address {original} is already mapped to {current}",
					self.direction
				),
			}),
			None => {
				self.pairs.push((original, replacement));
				Ok(())
			}
		}
	}

	pub fn direction(&self) -> Direction {
		self.direction
	}

	pub fn pairs(&self) -> &[(Ipv4Addr, Ipv4Addr)] {
		&self.pairs
	}

	pub fn len(&self) -> usize {
		self.pairs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pairs.is_empty()
	}

	/// Comma-joined `old/32:new/32` list for a bulk map flag.
	pub fn bulk_argument(&self) -> String {
		self.pairs
			.iter()
			.map(|(original, replacement)| format_pair(*original, *replacement))
			.collect::<Vec<_>>()
			.join(",")
	}
}

/// Format one pair with single-host masks on both sides.
pub fn format_pair(original: Ipv4Addr, replacement: Ipv4Addr) -> String {
	format!("{original}/32:{replacement}/32")
}

fn parse_entry(entry: &str) -> Result<(Ipv4Addr, Ipv4Addr)> {
	let invalid = |reason: &str| Error::InvalidRemap {
		entry: entry.to_string(),
		reason: reason.to_string(),
	};

	let (original, replacement) = entry
		.split_once('=')
		.or_else(|| entry.split_once(':'))
		.ok_or_else(|| invalid("expected OLD=NEW"))?;

	let original = original
		.trim()
		.parse::<Ipv4Addr>()
		.map_err(|_| invalid("original is not an IPv4 address"))?;
	let replacement = replacement
		.trim()
		.parse::<Ipv4Addr>()
		.map_err(|_| invalid("replacement is not an IPv4 address"))?;

	Ok((original, replacement))
}
