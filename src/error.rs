//! Error taxonomy for the tokenizer.
//!
//! Two fatal families: [`ConfigurationError`] for malformed rules, jumps and
//! references (raised synchronously by the introducing call), and
//! [`UsageError`] for operations on an engine that cannot accept them
//! (write after end, seek outside the buffered window). A rule that simply
//! does not match at the current offset is normal control flow and never
//! surfaces here.

use thiserror::Error;

/// Invalid rule, pattern or rule-set configuration. Always fatal at the
/// call that introduced it; the engine is never left mid-scan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A rule was added with no patterns.
    #[error("rule has an empty pattern chain")]
    EmptyChain,

    /// An alternation was built from an empty candidate list.
    #[error("alternation has no candidates")]
    EmptyAlternation,

    /// An alternation mixed candidates of different pattern types.
    #[error("alternation mixes pattern types")]
    MixedAlternation,

    /// Nested alternations are not supported.
    #[error("alternation candidates cannot themselves be alternations")]
    NestedAlternation,

    /// A byte range with `lo > hi`.
    #[error("invalid byte range {lo:#04x}..={hi:#04x}")]
    InvalidRange {
        /// Lower bound as given.
        lo: u8,
        /// Upper bound as given.
        hi: u8,
    },

    /// A numeric-length pattern of zero (or an empty length set).
    #[error("numeric length pattern must consume at least one byte")]
    ZeroNumericLength,

    /// A character-class pattern with no ranges.
    #[error("character class has no ranges")]
    EmptyRangeList,

    /// A terminator pattern (escaped literal, first-of candidate) with no
    /// bytes to search for.
    #[error("terminator pattern is empty")]
    EmptyTerminator,

    /// A relative jump landed outside the active rule list.
    #[error("jump of {jump} from rule {from} leaves the rule list ({len} rules)")]
    JumpOutOfBounds {
        /// Index of the rule the jump started from.
        from: usize,
        /// The relative jump, in group units.
        jump: isize,
        /// Length of the active rule list at the time of the jump.
        len: usize,
    },

    /// A rule that can never consume bytes pointed a jump back at itself
    /// without switching rule sets.
    #[error("rule can never make progress: zero-length match with a self-referential jump")]
    ZeroProgress,

    /// `load_rule_set`/`delete_rule_set` named a set that was never saved,
    /// or a matched rule referenced an unknown next set.
    #[error("unknown rule set '{0}'")]
    UnknownRuleSet(String),

    /// `load_rule_set_at` named a cursor index past the end of the set.
    #[error("cursor index {index} out of range for rule set '{name}' ({len} rules)")]
    CursorOutOfRange {
        /// The set that was loaded.
        name: String,
        /// The requested cursor index.
        index: usize,
        /// Number of rules in the set.
        len: usize,
    },

    /// Positional insertion or removal named an anchor no rule carries.
    #[error("no rule matches anchor '{0}'")]
    UnknownAnchor(String),

    /// `set_encoding` was given a name the engine does not know.
    #[error("unknown encoding '{0}'")]
    UnknownEncoding(String),

    /// Engine configuration bytes were not valid JSON of the expected shape.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A call the engine cannot honor in its current state. The engine is left
/// in its prior valid (or terminal) state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    /// `write` (or a second `end`) after the stream ended.
    #[error("write after end")]
    WriteAfterEnd,

    /// Any other mutating call (resume, seek, rule changes) on an engine
    /// that already ended.
    #[error("engine has ended")]
    Ended,

    /// `seek` would move the scan offset outside the buffered window.
    #[error("seek to {target} outside buffered window of {len} bytes")]
    SeekOutOfBounds {
        /// Absolute offset the seek resolved to (may be negative).
        target: i64,
        /// Buffered length at the time of the seek.
        len: usize,
    },
}

/// Unified error type returned by all fallible engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed configuration. See [`ConfigurationError`].
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Invalid operation for the engine's current state. See [`UsageError`].
    #[error(transparent)]
    Usage(#[from] UsageError),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = ConfigurationError::JumpOutOfBounds {
            from: 2,
            jump: -5,
            len: 3,
        };
        assert_eq!(
            err.to_string(),
            "jump of -5 from rule 2 leaves the rule list (3 rules)"
        );

        let err = UsageError::WriteAfterEnd;
        assert_eq!(err.to_string(), "write after end");
    }

    #[test]
    fn test_unified_error_conversion() {
        fn fails() -> Result<()> {
            Err(ConfigurationError::EmptyChain.into())
        }
        assert!(matches!(
            fails(),
            Err(Error::Configuration(ConfigurationError::EmptyChain))
        ));
    }
}
