//! # Structural Addresses
//!
//! Parsing and formatting of the dotted paths that identify a browsing
//! context's position in a session hierarchy:
//!
//! ```text
//! address   := segment ("." segment)*
//! segment   := "top" | "frames[" digits "]" | "popups[" digits "]"
//! ```
//!
//! The first segment is always `top`. Every following segment is a [`Step`]
//! into either the contained iframes or the spawned popups of the node
//! reached so far.

use crate::primitives::{
    ADDRESS_SEPARATOR, FRAMES_SEGMENT, MAX_ADDRESS_DEPTH, MAX_ADDRESS_LENGTH, POPUPS_SEGMENT,
    TOP_SEGMENT,
};
use crate::DistinctError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Which child mapping of a node a step indexes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SlotKind {
    /// `frames[N]`: an iframe contained by the parent.
    Frame,
    /// `popups[N]`: a window opened by the parent.
    Popup,
}

impl SlotKind {
    /// Segment keyword used in the address grammar.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            SlotKind::Frame => FRAMES_SEGMENT,
            SlotKind::Popup => POPUPS_SEGMENT,
        }
    }
}

/// One non-root segment of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Step {
    pub kind: SlotKind,
    pub slot: u32,
}

impl Step {
    #[must_use]
    pub const fn frame(slot: u32) -> Self {
        Self {
            kind: SlotKind::Frame,
            slot,
        }
    }

    #[must_use]
    pub const fn popup(slot: u32) -> Self {
        Self {
            kind: SlotKind::Popup,
            slot,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind.keyword(), self.slot)
    }
}

/// A parsed structural address.
///
/// `Address::top()` has no steps. Displaying an address always yields the
/// canonical string form, which is also what serde reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    steps: Vec<Step>,
}

impl Address {
    /// The session's root context.
    #[must_use]
    pub fn top() -> Self {
        Self::default()
    }

    /// Build an address from its steps below `top`.
    #[must_use]
    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Parse an address string.
    ///
    /// Slot numbers are read as integers, so leading zeros are accepted and
    /// dropped: `top.frames[007]` parses to the same address as
    /// `top.frames[7]` and displays as the latter.
    pub fn parse(input: &str) -> Result<Self, DistinctError> {
        let invalid = |reason: String| DistinctError::InvalidAddress {
            address: input.to_string(),
            reason,
        };

        if input.len() > MAX_ADDRESS_LENGTH {
            return Err(invalid(format!(
                "longer than {} bytes",
                MAX_ADDRESS_LENGTH
            )));
        }

        let mut segments = input.split(ADDRESS_SEPARATOR);
        match segments.next() {
            Some(TOP_SEGMENT) => {}
            Some(first) => {
                return Err(invalid(format!("must start with 'top', found '{}'", first)));
            }
            None => return Err(invalid("empty address".to_string())),
        }

        let mut steps = Vec::new();
        for segment in segments {
            if steps.len() + 1 >= MAX_ADDRESS_DEPTH {
                return Err(invalid(format!(
                    "deeper than {} segments",
                    MAX_ADDRESS_DEPTH
                )));
            }
            let step = parse_step(segment)
                .ok_or_else(|| invalid(format!("unrecognized segment '{}'", segment)))?;
            steps.push(step);
        }

        Ok(Self { steps })
    }

    /// Steps below `top`, root-to-leaf.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Whether this address names the root context.
    #[must_use]
    pub fn is_top(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps below `top`.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.steps.len()
    }

    /// Address of the parent context, `None` for `top`.
    #[must_use]
    pub fn parent(&self) -> Option<Address> {
        let (_, rest) = self.steps.split_last()?;
        Some(Self {
            steps: rest.to_vec(),
        })
    }

    /// Last step, `None` for `top`.
    #[must_use]
    pub fn last(&self) -> Option<Step> {
        self.steps.last().copied()
    }

    /// Address of a child context.
    #[must_use]
    pub fn child(&self, step: Step) -> Address {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }
}

/// Parse a non-root segment: `frames[N]` or `popups[N]`.
fn parse_step(segment: &str) -> Option<Step> {
    let (keyword, rest) = segment.split_once('[')?;
    let digits = rest.strip_suffix(']')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let slot = digits.parse::<u32>().ok()?;

    match keyword {
        FRAMES_SEGMENT => Some(Step::frame(slot)),
        POPUPS_SEGMENT => Some(Step::popup(slot)),
        _ => None,
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(TOP_SEGMENT)?;
        for step in &self.steps {
            write!(f, "{}{}", ADDRESS_SEPARATOR, step)?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = DistinctError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// TESTS
// =============================================================================
