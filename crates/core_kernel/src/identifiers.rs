//! Strongly-typed identifiers for domain entities
//!
//! Using newtype wrappers around UUIDs provides type safety and prevents
//! accidental mixing of different identifier types. External identifiers
//! (the CMS post id and the search-index document id) get their own
//! newtypes so a despacho's three representations can never be confused.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Returns the identifier prefix for display
            pub fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                // Strip prefix if present
                let uuid_str = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(uuid_str)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

// Directory domain identifiers
define_id!(DespachoId, "DSP");
define_id!(SedeId, "SED");

// Sync infrastructure identifiers
define_id!(SyncEntryId, "SYQ");

/// External CMS post identifier
///
/// The CMS assigns integer ids; this is the only identifier the external
/// system owns. It is set on a despacho at most once and never repointed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CmsId(i64);

impl CmsId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Derives the search-index document id mirrored from this CMS post
    pub fn search_index_id(&self) -> SearchIndexId {
        SearchIndexId(format!("despacho_{}", self.0))
    }
}

impl fmt::Display for CmsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CmsId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of the mirrored document in the search index
///
/// Derived from the CMS id; the index is updated by the CMS itself, so this
/// id is recorded for correlation only and never written to directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchIndexId(String);

impl SearchIndexId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchIndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_despacho_id_display() {
        let id = DespachoId::new();
        let display = id.to_string();
        assert!(display.starts_with("DSP-"));
    }

    #[test]
    fn test_id_parsing() {
        let original = DespachoId::new();
        let parsed: DespachoId = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_uuid_conversion() {
        let uuid = Uuid::new_v4();
        let sede_id = SedeId::from(uuid);
        let back: Uuid = sede_id.into();
        assert_eq!(uuid, back);
    }

    #[test]
    fn test_search_index_id_derivation() {
        let cms_id = CmsId::new(1001);
        assert_eq!(cms_id.search_index_id().as_str(), "despacho_1001");
    }
}
