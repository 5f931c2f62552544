//! # Input Limits
//!
//! Hardcoded bounds applied by the stores before any write reaches a backend.
//! Inputs outside these bounds are rejected with `GraphError::InvalidArgument`.

use crate::GraphError;

/// Maximum length for entity and relation names.
pub const MAX_NAME_LENGTH: usize = 256;

/// Maximum length for entity and relation descriptions (16 KB).
pub const MAX_DESCRIPTION_LENGTH: usize = 16 * 1024;

/// Maximum length for a facet type tag.
pub const MAX_FACET_TYPE_LENGTH: usize = 64;

/// Maximum size of a serialized facet configuration (1 MB).
///
/// Checked against the encoded text, so it bounds what a backend stores.
pub const MAX_CONFIGURATION_BYTES: usize = 1024 * 1024;

/// Reject an empty or oversized required name.
pub fn validate_name(field: &str, value: &str) -> Result<(), GraphError> {
    if value.trim().is_empty() {
        return Err(GraphError::InvalidArgument(format!(
            "{} must not be empty",
            field
        )));
    }
    if value.len() > MAX_NAME_LENGTH {
        return Err(GraphError::InvalidArgument(format!(
            "{} length {} exceeds maximum {} bytes",
            field,
            value.len(),
            MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

/// Reject an oversized optional description.
pub fn validate_description(value: Option<&str>) -> Result<(), GraphError> {
    match value {
        Some(text) if text.len() > MAX_DESCRIPTION_LENGTH => {
            Err(GraphError::InvalidArgument(format!(
                "description length {} exceeds maximum {} bytes",
                text.len(),
                MAX_DESCRIPTION_LENGTH
            )))
        }
        _ => Ok(()),
    }
}

/// Reject an empty or oversized facet type tag.
pub fn validate_facet_type(value: &str) -> Result<(), GraphError> {
    if value.trim().is_empty() {
        return Err(GraphError::InvalidArgument(
            "facet type must not be empty".to_string(),
        ));
    }
    if value.len() > MAX_FACET_TYPE_LENGTH {
        return Err(GraphError::InvalidArgument(format!(
            "facet type length {} exceeds maximum {} bytes",
            value.len(),
            MAX_FACET_TYPE_LENGTH
        )));
    }
    Ok(())
}
