//! Compound identifiers for association resources.
//!
//! A link between two entities is identified in state by a single string,
//! `"{child_id}:{parent_id}"`. IDs are vendor-generated tokens and never
//! contain the separator, so no escaping is applied.
//!
//! # Example
//!
//! ```
//! use hemmer_provider_pagerduty::id::{decode, encode};
//!
//! let id = encode("user_123", "team_456");
//! assert_eq!(id, "user_123:team_456");
//!
//! let (child, parent) = decode(&id).unwrap();
//! assert_eq!(child, "user_123");
//! assert_eq!(parent, "team_456");
//!
//! assert!(decode("malformed").is_err());
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Separator between the child and parent halves of a compound ID.
pub const SEPARATOR: char = ':';

/// Join a child and parent ID into a compound ID.
pub fn encode(child_id: &str, parent_id: &str) -> String {
    format!("{}{}{}", child_id, SEPARATOR, parent_id)
}

/// Split a compound ID into `(child_id, parent_id)`.
///
/// Splits on the first separator. Both halves must be non-empty.
pub fn decode(id: &str) -> Result<(String, String), ProviderError> {
    match id.split_once(SEPARATOR) {
        Some((child, parent)) if !child.is_empty() && !parent.is_empty() => {
            Ok((child.to_string(), parent.to_string()))
        },
        _ => Err(ProviderError::MalformedIdentifier(format!(
            "expected '<child_id>{}<parent_id>', got '{}'",
            SEPARATOR, id
        ))),
    }
}

/// A link between a parent entity and one of its children.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    /// ID of the entity holding the membership list (e.g. a team).
    pub parent_id: String,
    /// ID of the member (e.g. a user).
    pub child_id: String,
}

impl Relationship {
    /// Create a relationship from its two IDs.
    pub fn new(parent_id: impl Into<String>, child_id: impl Into<String>) -> Self {
        Self {
            parent_id: parent_id.into(),
            child_id: child_id.into(),
        }
    }

    /// Decode a relationship from its compound ID.
    pub fn from_id(id: &str) -> Result<Self, ProviderError> {
        let (child_id, parent_id) = decode(id)?;
        Ok(Self {
            parent_id,
            child_id,
        })
    }

    /// The compound ID for this relationship.
    pub fn id(&self) -> String {
        encode(&self.child_id, &self.parent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(encode("user_123", "team_456"), "user_123:team_456");
    }

    #[test]
    fn test_decode() {
        let (child, parent) = decode("user_123:team_456").unwrap();
        assert_eq!(child, "user_123");
        assert_eq!(parent, "team_456");
    }

    #[test]
    fn test_decode_splits_on_first_separator() {
        let (child, parent) = decode("PABC:PDEF:PGHI").unwrap();
        assert_eq!(child, "PABC");
        assert_eq!(parent, "PDEF:PGHI");
    }

    #[test]
    fn test_decode_malformed() {
        for id in ["malformed", "", ":", "user_123:", ":team_456"] {
            let err = decode(id).unwrap_err();
            assert!(
                matches!(err, ProviderError::MalformedIdentifier(_)),
                "expected malformed identifier for {:?}, got {:?}",
                id,
                err
            );
        }
    }

    #[test]
    fn test_decode_inverts_encode() {
        let pairs = [("PXPGF42", "PQ9K7I8"), ("a", "b"), ("user_123", "team_456")];
        for (child, parent) in pairs {
            let (c, p) = decode(&encode(child, parent)).unwrap();
            assert_eq!((c.as_str(), p.as_str()), (child, parent));
        }
    }

    #[test]
    fn test_relationship_id() {
        let rel = Relationship::new("team_456", "user_123");
        assert_eq!(rel.id(), "user_123:team_456");
        assert_eq!(Relationship::from_id(&rel.id()).unwrap(), rel);
    }
}
