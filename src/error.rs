//! Error kinds for a [`FlexBuffer`](crate::FlexBuffer) build (§7).
//!
//! Every variant corresponds to an invariant violation from the data
//! model (§3); there is no partial-recovery path for any of them — once
//! one is returned, the encoder that produced it is poisoned and must be
//! discarded (see [`FlexBuffer`](crate::FlexBuffer)'s internal
//! `poisoned` flag).

use thiserror::Error;

/// The maximum size, in bytes, a buffer produced by this crate may reach.
///
/// Chosen well below `usize::MAX` so that relative-offset arithmetic
/// (always `referrer_pos - target`, both `usize`) never has to reason
/// about wraparound.
pub const MAX_BUFFER_LEN: usize = 1 << 48;

/// Errors that can occur while building a FlexBuffers document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlexBufferError {
    /// `end_vector`/`sort_and_end_map` was called with a scope-start
    /// index that does not describe the current stack, or `finish` was
    /// called without exactly one value left on the stack (§3 I2, I3).
    #[error("unbalanced scope: expected stack depth {expected}, found {actual}")]
    UnbalancedScope {
        expected: usize,
        actual: usize,
    },

    /// A map scope closed with an odd number of pending stack entries:
    /// a key with no matching value.
    #[error("map has an odd number of pending entries ({found}): a key is missing its value")]
    OddMapEntries { found: usize },

    /// A value was appended inside a map scope without a preceding
    /// `add_key` call (§3 I4).
    #[error("value appended inside a map without a preceding key")]
    MissingKey,

    /// `add_key` was called while no map scope was open — the converse
    /// misuse of `MissingKey` (§3 I4 governs keys inside a map; this is
    /// a key with no map to belong to).
    #[error("add_key called outside of any open map scope")]
    KeyOutsideMap,

    /// The buffer would grow past [`MAX_BUFFER_LEN`].
    #[error("buffer would grow to {attempted} bytes, exceeding the {MAX_BUFFER_LEN} byte limit")]
    SinkOverflow { attempted: usize },

    /// A string input failed UTF-8 validation (only reachable through a
    /// checked entry point; the default, unchecked path never produces
    /// this error — see §9 "Open question: string UTF-8 validation").
    #[error("invalid UTF-8 in string input: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// An operation was attempted on an encoder that already failed a
    /// prior operation. The encoder must be discarded; there is no way
    /// to clear this flag.
    #[error("encoder is poisoned by a previous error and can no longer be used")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, FlexBufferError>;
