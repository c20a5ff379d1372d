use std::fmt;

/// Errors returned by the arena, trie and shadow-rule-table operations.
///
/// Unknown-prefix removal is deliberately not represented here: it is
/// signalled by returning `None`, not by an error (see module docs on
/// `ipv4::trie::remove` / `ipv6::trie::remove`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpmError {
    /// No free node is available in the relevant pool. The insert that
    /// triggered this is aborted without a partial commit to the shadow
    /// rule table.
    ArenaExhausted,
    /// The shadow rule table has no free slot. `rule_add` becomes a no-op.
    RuleTableFull,
    /// The named arena could not be created (already registered, or the
    /// requested capacities are invalid).
    InitFailure,
}

impl fmt::Display for LpmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LpmError::ArenaExhausted => {
                write!(f, "node arena exhausted: no free node available")
            }
            LpmError::RuleTableFull => {
                write!(f, "shadow rule table is full")
            }
            LpmError::InitFailure => {
                write!(f, "arena initialization failed")
            }
        }
    }
}

impl std::error::Error for LpmError {}
