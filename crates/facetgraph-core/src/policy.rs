//! # Uniqueness Policy
//!
//! Which uniqueness rules the stores enforce. Every rule is off by default:
//! names repeat freely and an owner may carry several facets of one type.
//! A rule that is switched on applies to creates and updates alike and
//! surfaces as `GraphError::Conflict`.

use serde::{Deserialize, Serialize};

/// Uniqueness rules applied by the entity, relation and facet stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphPolicy {
    /// At most one entity per name.
    pub unique_entity_names: bool,
    /// At most one relation per (source, target, name).
    pub unique_relation_names: bool,
    /// At most one facet per (owner, type).
    pub unique_facet_types: bool,
}

impl GraphPolicy {
    /// Every uniqueness rule switched on.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            unique_entity_names: true,
            unique_relation_names: true,
            unique_facet_types: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_permissive() {
        let policy = GraphPolicy::default();
        assert!(!policy.unique_entity_names);
        assert!(!policy.unique_relation_names);
        assert!(!policy.unique_facet_types);
    }

    #[test]
    fn missing_fields_fall_back_to_default() {
        let policy: GraphPolicy =
            serde_json::from_str(r#"{"unique_facet_types": true}"#).expect("parse");
        assert!(policy.unique_facet_types);
        assert!(!policy.unique_entity_names);
    }
}
