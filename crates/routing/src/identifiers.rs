//! Type-safe identifiers for track segments and stations.
//!
//! Identifiers are opaque to the routing code: they are compared, hashed and
//! ordered, never interpreted. All identifiers use `Arc<str>` so paths and
//! adjacency lists can clone them freely.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::models::types::{InvalidInput, Result};

macro_rules! impl_identifier {
    ($name:ident, $kind:literal) => {
        #[derive(Clone, Debug)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(s: impl AsRef<str>) -> Self {
                Self(s.as_ref().into())
            }

            /// Parse user-supplied text, rejecting empty or whitespace-bearing ids.
            pub fn parse(s: &str) -> Result<Self> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(InvalidInput::MalformedIdentifier {
                        kind: $kind,
                        value: s.to_string(),
                    });
                }
                if trimmed.chars().any(char::is_whitespace) || trimmed.contains(';') {
                    return Err(InvalidInput::MalformedIdentifier {
                        kind: $kind,
                        value: s.to_string(),
                    });
                }
                Ok(Self::new(trimmed))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
            }
        }

        impl Eq for $name {}

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> Ordering {
                self.0.cmp(&other.0)
            }
        }

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.0.hash(state);
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

impl_identifier!(SegmentIdentifier, "segment");
impl_identifier!(StationIdentifier, "station");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_equality() {
        let id1 = SegmentIdentifier::new("seg_123");
        let id2 = SegmentIdentifier::new("seg_123");
        let id3 = id1.clone();

        assert_eq!(id1, id2);
        assert_eq!(id1, id3);
        assert!(Arc::ptr_eq(&id1.0, &id3.0)); // Clone shares Arc
    }

    #[test]
    fn test_identifier_hash() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(SegmentIdentifier::new("test"), 42);

        assert_eq!(map.get(&SegmentIdentifier::new("test")), Some(&42));
    }

    #[test]
    fn test_identifier_ordering() {
        let mut ids = vec![
            SegmentIdentifier::new("b"),
            SegmentIdentifier::new("a"),
            SegmentIdentifier::new("c"),
        ];
        ids.sort();
        let names: Vec<_> = ids.iter().map(SegmentIdentifier::as_str).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_identifier_parse() {
        assert_eq!(
            SegmentIdentifier::parse("  1042 ").unwrap(),
            SegmentIdentifier::new("1042")
        );
        assert!(SegmentIdentifier::parse("").is_err());
        assert!(SegmentIdentifier::parse("   ").is_err());
        assert!(SegmentIdentifier::parse("a b").is_err());
        assert!(StationIdentifier::parse("a;b").is_err());
    }

    #[test]
    fn test_identifier_display() {
        let id = StationIdentifier::new("central");
        assert_eq!(format!("{}", id), "central");
    }
}
