//! Typed datastore keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random key
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

entity_id!(
    /// Key of a [`super::Trunk`]
    TrunkId
);
entity_id!(
    /// Key of a [`super::Doc`] snapshot
    DocId
);
entity_id!(
    /// Key of a content [`super::Element`] (including doc links)
    ElementId
);

/// Opaque user identity handle supplied by the external auth collaborator.
///
/// Equality-comparable only; the engine uses it purely as a map and
/// filter key and never inspects the contents. There is deliberately no
/// ambient "current user": every operation that touches per-user state
/// takes the user explicitly, so dashboards can act on behalf of others.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(TrunkId::new(), TrunkId::new());
        assert_ne!(DocId::new(), DocId::new());
    }

    #[test]
    fn test_user_id_equality() {
        assert_eq!(UserId::new("alice"), UserId::new("alice"));
        assert_ne!(UserId::new("alice"), UserId::new("bob"));
    }
}
