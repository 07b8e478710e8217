//! Newtype IDs for type-safe entity references.
//!
//! Remote commerce identifiers are opaque strings. Use the `define_id!` macro
//! to create wrappers that prevent mixing identifiers of different entities
//! and reject values that could never have come from the remote API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors that can occur when parsing a string identifier.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty or only whitespace.
    #[error("identifier cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("identifier must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input has leading or trailing whitespace.
    #[error("identifier must not have surrounding whitespace")]
    Untrimmed,
}

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` as a bare string, validated through `parse()`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Validating constructor `parse()` and accessor `as_str()`
/// - `Display`, `FromStr` and `AsRef<str>` implementations
///
/// # Example
///
/// ```rust
/// # use bulkcart_core::define_id;
/// define_id!(WarehouseId);
/// define_id!(QuoteId);
///
/// let warehouse = WarehouseId::parse("wh-1").unwrap();
/// let quote = QuoteId::parse("wh-1").unwrap();
///
/// // These are different types, so this won't compile:
/// // let _: WarehouseId = quote;
/// # let _ = (warehouse, quote);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Maximum length of an identifier.
            pub const MAX_LENGTH: usize = 255;

            /// Parse an identifier from a string.
            ///
            /// # Errors
            ///
            /// Returns an error if the input is empty, longer than
            /// `MAX_LENGTH`, or has surrounding whitespace.
            pub fn parse(s: &str) -> ::core::result::Result<Self, $crate::IdError> {
                if s.trim().is_empty() {
                    return Err($crate::IdError::Empty);
                }
                if s.len() > Self::MAX_LENGTH {
                    return Err($crate::IdError::TooLong {
                        max: Self::MAX_LENGTH,
                    });
                }
                if s.trim() != s {
                    return Err($crate::IdError::Untrimmed);
                }
                Ok(Self(s.to_owned()))
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier and returns its inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::IdError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl ::core::convert::TryFrom<String> for $name {
            type Error = $crate::IdError;

            fn try_from(s: String) -> ::core::result::Result<Self, Self::Error> {
                Self::parse(&s)
            }
        }

        impl ::core::convert::From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Define standard entity IDs
define_id!(ProductId);
define_id!(OrderReference);

/// Identifier of one cart session (store lifetime), used to correlate logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new random session ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn test_parse_valid_ids() {
        assert!(ProductId::parse("P1").is_ok());
        assert!(ProductId::parse("gid://shop/Product/123").is_ok());
        assert_eq!(ProductId::parse("sku-9").unwrap().as_str(), "sku-9");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(ProductId::parse(""), Err(IdError::Empty));
        assert_eq!(ProductId::parse("   "), Err(IdError::Empty));
    }

    #[test]
    fn test_parse_untrimmed() {
        assert_eq!(ProductId::parse(" P1"), Err(IdError::Untrimmed));
    }

    #[test]
    fn test_parse_too_long() {
        let long = "x".repeat(ProductId::MAX_LENGTH + 1);
        assert!(matches!(
            ProductId::parse(&long),
            Err(IdError::TooLong { max: 255 })
        ));
    }

    #[test]
    fn test_serde_as_bare_string() {
        let id = ProductId::parse("P1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"P1\"");
        let back: ProductId = serde_json::from_str("\"P1\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_deserialize_validates() {
        assert!(serde_json::from_str::<ProductId>("\"\"").is_err());
        assert!(serde_json::from_str::<ProductId>("\" P1\"").is_err());
        let long = format!("\"{}\"", "x".repeat(ProductId::MAX_LENGTH + 1));
        assert!(serde_json::from_str::<OrderReference>(&long).is_err());
    }

    #[test]
    fn test_ids_as_map_keys() {
        let mut map = BTreeMap::new();
        map.insert(ProductId::parse("P1").unwrap(), 1);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"P1":1}"#);

        let back: BTreeMap<ProductId, i32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
        assert!(serde_json::from_str::<BTreeMap<ProductId, i32>>(r#"{"":1}"#).is_err());
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }
}
