//! Compose chains of source maps and resolve generated positions back to
//! the original sources.
//!
//! A build pipeline that transforms code in stages (transpile, compress,
//! mangle) leaves one source map per stage, each describing only the step it
//! belongs to. This crate folds such a chain into a single flat map whose
//! lookups go straight from the final generated code to the first stage's
//! sources, and provides the [`Consumer`] that answers those lookups for any
//! flat or indexed map.
//!
//! Unmapped regions stay unmapped: a hole on either side of the chain is a
//! hole in the composite, and lookups report it as `None` rather than an
//! error. The `x_facebook_sources` function-name channel is carried through
//! composition alongside the sources it describes.
//!
//! ```
//! use source_map_compose::{compose_source_maps, Consumer, GeneratedPosition, SourceMap};
//!
//! # fn main() -> Result<(), source_map_compose::Error> {
//! let transpile = SourceMap::from_json(
//!     r#"{"version": 3, "sources": ["a.js"], "names": ["a"], "mappings": "AAACA,CAACA"}"#,
//! )?;
//! let minify = SourceMap::from_json(
//!     r#"{"version": 3, "sources": ["out.js"], "names": ["b"], "mappings": "AAAAA,C,CAAAA,CAACA"}"#,
//! )?;
//!
//! let composed = compose_source_maps(&[transpile, minify])?;
//! let consumer = Consumer::new(&composed)?;
//!
//! let original = consumer
//!     .original_position_for(GeneratedPosition::new(1, 0))
//!     .expect("column 0 is mapped");
//! assert_eq!(original.source, "a.js");
//! assert_eq!((original.line, original.column), (1, 1));
//! assert_eq!(original.name, Some("a"));
//! # Ok(())
//! # }
//! ```

#![deny(missing_debug_implementations)]

use thiserror::Error;

mod compose;
mod consumer;
mod map;
mod mappings;
mod position;

pub use crate::compose::compose_source_maps;
pub use crate::consumer::{Consumer, FlatConsumer, IndexedConsumer, OriginalPosition};
pub use crate::map::{FlatMap, FunctionMap, IndexedMap, Section, SectionOffset, SourceMap};
pub use crate::mappings::{parse_mappings, Mappings, MappingsEncoder, OriginalLocation, Segment};
pub use crate::position::GeneratedPosition;

/// Everything that can go wrong while parsing, querying, or composing.
///
/// An unmapped position is not an error; lookups signal it with `None`.
#[derive(Debug, Error)]
pub enum Error {
    /// The map is structurally invalid: wrong or missing version, neither or
    /// both of `mappings` and `sections`, a malformed section, or a segment
    /// index that escapes its string table.
    #[error("invalid source map: {0}")]
    InvalidMap(String),

    /// The map is not valid JSON, or a field has the wrong shape.
    #[error("invalid source map JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A `mappings` field is not well-formed Base64 VLQ.
    #[error("invalid VLQ in mappings: {0:?}")]
    Vlq(vlq::Error),

    /// A delta drove a running field below zero.
    #[error("unexpected negative number in mappings")]
    UnexpectedNegativeNumber,

    /// A field left the 32-bit range.
    #[error("unexpected number outside of 32-bit range in mappings")]
    UnexpectedlyBigNumber,

    /// A segment had a field count other than 1, 4, or 5.
    #[error("mapping segment has {0} fields, expected 1, 4, or 5")]
    InvalidSegmentArity(u32),

    /// The chain of maps cannot be composed; see the message for which map
    /// broke the preconditions.
    #[error("unsupported composition: {0}")]
    UnsupportedComposition(String),
}
