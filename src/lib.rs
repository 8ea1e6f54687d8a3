/// A DText to markup converter: a tag pass followed by inline rewriting
pub mod ast;
pub mod batch;
pub mod error;
pub mod inline;
pub mod parser;
pub mod pipeline;
pub mod renderer;
pub mod rewriters;

pub use error::{Error, Result};
pub use pipeline::{Options, Pipeline};

/// Convert DText to markup with the default options.
///
/// Every call compiles a fresh [`Pipeline`]. Callers converting more than a
/// handful of documents should build one pipeline and reuse it.
pub fn dtext_to_markup(dtext: Option<&str>) -> Result<String> {
    Pipeline::new(&Options::default())?.to_markup(dtext)
}

/// Strip DText down to its literal text with the default options.
///
/// Compiles a fresh [`Pipeline`] per call, like [`dtext_to_markup`].
pub fn dtext_to_raw(dtext: Option<&str>) -> Result<String> {
    Pipeline::new(&Options::default())?.to_raw(dtext)
}
