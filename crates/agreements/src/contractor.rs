//! Contractor (counterparty) entity.

use serde::{Deserialize, Serialize};

use col_core::{ContractorId, DomainError, DomainResult};

/// A party that can be assigned to agreements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contractor {
    pub id: ContractorId,
    pub name: String,
    pub description: Option<String>,
    pub ordinal: i32,
    /// National tax code, when the contractor is a natural person.
    pub tax_code: Option<String>,
    /// VAT number, when the contractor is a company.
    pub vat_number: Option<String>,
    pub email: Option<String>,
    pub kind: Option<String>,
}

impl Contractor {
    pub fn new(id: ContractorId, name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::missing("contractor name"));
        }
        Ok(Self {
            id,
            name,
            description: None,
            ordinal: 0,
            tax_code: None,
            vat_number: None,
            email: None,
            kind: None,
        })
    }

    /// Contractors without an address cannot receive notifications.
    pub fn has_mailbox(&self) -> bool {
        self.email.as_deref().is_some_and(|e| !e.trim().is_empty())
    }
}
