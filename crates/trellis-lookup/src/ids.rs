//! Opaque identifiers for graph objects.
//!
//! All ids are strings owned by the backend. The lookup layer only needs to
//! tell a real id (`_` followed by alphanumerics) apart from a friendly id
//! (a lowercase slug) when resolving links and `[[/entry/...]]` references.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

define_id!(
    /// Identifies a site; every query is scoped to exactly one.
    SiteId
);
define_id!(
    /// Identifies an entry (a node of the content graph).
    EntryId
);
define_id!(
    /// Identifies an entry type.
    EntryTypeId
);
define_id!(
    /// Identifies a property (value-typed or relationship-typed).
    PropertyId
);
define_id!(
    /// Identifies a single stored property fact.
    FactId
);

/// Returns true if `value` has the shape of an opaque id.
pub fn is_entry_id(value: &str) -> bool {
    match value.strip_prefix('_') {
        Some(rest) => !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric()),
        None => false,
    }
}

/// Returns true if `value` is a friendly id: a non-empty lowercase slug.
pub fn is_friendly_id(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('-')
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("_1a2B", true ; "alphanumeric id")]
    #[test_case("_", false ; "bare underscore")]
    #[test_case("_ab-c", false ; "dash in id")]
    #[test_case("tree", false ; "friendly id")]
    fn detects_entry_ids(input: &str, expected: bool) {
        assert_eq!(is_entry_id(input), expected);
    }

    #[test_case("ponderosa-pine", true ; "slug")]
    #[test_case("pine2", true ; "digits")]
    #[test_case("Pine", false ; "uppercase")]
    #[test_case("-pine", false ; "leading dash")]
    #[test_case("", false ; "empty")]
    #[test_case("_abc", false ; "id shape")]
    fn detects_friendly_ids(input: &str, expected: bool) {
        assert_eq!(is_friendly_id(input), expected);
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = EntryId::new("_42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"_42\"");
        assert_eq!(id.to_string(), "_42");
    }
}
