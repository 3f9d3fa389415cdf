/// Index types shared across layers
use std::fmt;

/// Index of an instruction in a dialect's grammar tables.
///
/// Grammars reference each other by name only while a dialect is being
/// built; after that every reference is one of these.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GrammarId(pub u32);

impl GrammarId {
    /// Sentinel stored in aux data for "no grammar".
    pub const NONE_RAW: u32 = u32::MAX;

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Decode an aux-data slot, mapping the sentinel to `None`.
    pub fn from_raw(raw: u32) -> Option<Self> {
        (raw != Self::NONE_RAW).then_some(Self(raw))
    }
}

impl fmt::Debug for GrammarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g#{}", self.0)
    }
}

impl fmt::Display for GrammarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
