//! Error types for DText conversion.

use crate::ast::TagName;

/// Shorthand for results produced by this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error from a conversion call.
///
/// Malformed markup never produces an error; it degrades to literal text.
/// The variants below signal a broken tree invariant and abort only the
/// conversion that hit them.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A tag carries children its kind does not allow.
    #[error("malformed `{tag}` node at byte {position}: {detail}")]
    MalformedTree {
        /// Kind of the offending node.
        tag: TagName,
        /// Byte offset where the node starts.
        position: usize,
        /// What was found instead.
        detail: String,
    },

    /// Attribute parsing did not settle within the iteration bound.
    #[error("attribute parsing did not terminate for header `{header}`")]
    AttributeOverflow {
        /// The tag header being parsed.
        header: String,
    },

    /// A tree was finalized while a tag was still open.
    #[error("unresolved end position for `{tag}` opened at byte {position}")]
    UnresolvedSpan {
        /// Kind of the open node.
        tag: TagName,
        /// Byte offset where the node starts.
        position: usize,
    },

    /// A rewriter or grammar pattern failed to compile.
    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
