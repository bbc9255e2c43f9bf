//! Controlled vocabularies (agreement types, scopes) and lifecycle status.

use serde::{Deserialize, Serialize};

/// One entry of a vocabulary table (type, scope), ordered by `ordinal`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeItem {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub ordinal: i32,
}

impl CodeItem {
    pub fn new(id: i32, name: impl Into<String>, ordinal: i32) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            ordinal,
        }
    }
}

/// Agreement lifecycle status. Queries only ever surface `Active` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgreementStatus {
    Active,
    Expired,
    Suspended,
}

impl AgreementStatus {
    /// Status name as stored in the status table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ATTIVO",
            Self::Expired => "SCADUTO",
            Self::Suspended => "SOSPESO",
        }
    }
}

impl core::fmt::Display for AgreementStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_match_storage() {
        assert_eq!(AgreementStatus::Active.as_str(), "ATTIVO");
        assert_eq!(AgreementStatus::Expired.to_string(), "SCADUTO");
    }
}
