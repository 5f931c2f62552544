//! # Formats
//!
//! Serialized forms owned by the engine. Row encoding belongs to each
//! backend; the facet configuration text format is shared and lives here.

mod document;

pub use document::{decode_document, encode_document};
