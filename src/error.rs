//! Error types returned by construction and (de)serialization.

use core::fmt;

/// Failure modes for filter construction, serialization, and deserialization.
///
/// There is deliberately no variant carrying a diagnostic string or error
/// code beyond this enum: callers that need more detail than "which
/// contract was violated" should consult the construction/serialization
/// methods' documentation, not runtime state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Peeling failed to recover all keys within the retry budget. Practically
    /// impossible for distinct keys; for `Fuse` filters this can also surface
    /// if the key multiset has far more than the ~0.1% duplicate tolerance
    /// the duplicate-detection fallback is sized for.
    ConstructionFailed,
    /// The destination buffer passed to `serialize`/`pack` is smaller than
    /// `serialization_bytes`/`pack_bytes` reports.
    BufferTooSmall,
    /// The source buffer passed to `deserialize`/`unpack` is shorter than
    /// the length its own header declares.
    Truncated,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::ConstructionFailed => "filter construction did not converge within the retry budget",
            Self::BufferTooSmall => "destination buffer is smaller than the required serialized size",
            Self::Truncated => "source buffer is shorter than its declared length",
        };
        f.write_str(msg)
    }
}
