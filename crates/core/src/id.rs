//! Strongly-typed identifiers used across the domain.
//!
//! All primary keys in this system are relational serials, so the newtypes
//! wrap integers rather than UUIDs. Request parameters arrive as strings and
//! parse through `FromStr`, turning garbage into `DomainError::InvalidId`.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of an agreement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgreementId(i64);

/// Identifier of a contractor.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractorId(i64);

/// Identifier of a user (actor identity).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

/// Identifier of a recipient group (agreement visibility / mail routing).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientGroupId(i64);

macro_rules! impl_int_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(value))
            }
        }
    };
}

impl_int_newtype!(AgreementId, "AgreementId");
impl_int_newtype!(ContractorId, "ContractorId");
impl_int_newtype!(UserId, "UserId");
impl_int_newtype!(RecipientGroupId, "RecipientGroupId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_ids() {
        let id: AgreementId = "42".parse().unwrap();
        assert_eq!(id, AgreementId::new(42));
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let id: ContractorId = " 7 ".parse().unwrap();
        assert_eq!(id.as_i64(), 7);
    }

    #[test]
    fn rejects_non_numeric_input() {
        let err = "abc".parse::<AgreementId>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(_)));
    }
}
