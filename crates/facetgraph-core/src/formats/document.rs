//! # Configuration Document Format
//!
//! Facet configurations are arbitrary nested documents. Backends store them
//! as JSON text inside the facet row; this module owns both directions.
//!
//! ## Lossy Recovery
//!
//! Decoding never fails. Text that does not parse reads back as an empty
//! document and a warning is logged, so one damaged facet cannot make an
//! entity, relation or graph snapshot unreadable.

use crate::primitives::MAX_CONFIGURATION_BYTES;
use crate::{Document, FacetId, GraphError, empty_document};

/// Serialize a configuration document for storage.
///
/// Returns `InvalidArgument` when the encoded text exceeds
/// `MAX_CONFIGURATION_BYTES`.
pub fn encode_document(document: &Document) -> Result<String, GraphError> {
    let text = serde_json::to_string(document).map_err(|e| {
        GraphError::InvalidArgument(format!("configuration is not serializable: {}", e))
    })?;
    if text.len() > MAX_CONFIGURATION_BYTES {
        return Err(GraphError::InvalidArgument(format!(
            "configuration size {} exceeds maximum {} bytes",
            text.len(),
            MAX_CONFIGURATION_BYTES
        )));
    }
    Ok(text)
}

/// Parse stored configuration text, falling back to an empty document.
pub fn decode_document(facet: FacetId, text: &str) -> Document {
    match serde_json::from_str(text) {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!(
                facet = %facet,
                error = %e,
                "stored facet configuration is malformed; reading it as an empty document"
            );
            empty_document()
        }
    }
}
