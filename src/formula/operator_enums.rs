//! Tags for the non-leaf node kinds of a [`crate::formula::Formula`].
//!
//! Each variant carries the "node kind identifier" that spec §3 requires:
//! a small base id per operator, with the three counting operators adding
//! `3*k` so that e.g. `AtLeast-2` and `AtLeast-3` colorize differently in
//! the canonical graph embedding (see [`crate::formula::graph`]).

use std::fmt;

/// Base ids for each operator kind, before the `3*k` counting adjustment.
pub(crate) mod base_id {
    pub const NOT: u32 = 1;
    pub const AND: u32 = 2;
    pub const OR: u32 = 3;
    pub const IMPLIES: u32 = 4;
    pub const EQUIV: u32 = 5;
    pub const AT_LEAST: u32 = 6;
    pub const AT_MOST: u32 = 7;
    pub const EXACTLY: u32 = 8;
}

/// A counting-operator kind: `AtLeast-k`, `AtMost-k` or `Exactly-k`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CountKind {
    AtLeast,
    AtMost,
    Exactly,
}

impl CountKind {
    pub(crate) fn base_id(self) -> u32 {
        match self {
            Self::AtLeast => base_id::AT_LEAST,
            Self::AtMost => base_id::AT_MOST,
            Self::Exactly => base_id::EXACTLY,
        }
    }

    /// Node-kind id for this counting operator at threshold `k`.
    pub(crate) fn node_kind(self, k: usize) -> u32 {
        self.base_id() + 3 * (k as u32)
    }
}

impl fmt::Display for CountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AtLeast => "AtLeast",
            Self::AtMost => "AtMost",
            Self::Exactly => "Exactly",
        };
        write!(f, "{s}")
    }
}
