//! Command descriptors.
//!
//! A descriptor is one row of the command table: which token a command
//! answers to, which handler implements it, and the view it lands on. The
//! registry is built from these at startup and never changes afterwards.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Storage-backed description of a dispatchable command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    /// Request token the command answers to (`ent=<token>`).
    pub token: String,
    /// Name resolved against the compile-time handler factory table.
    pub handler_name: String,
    /// Default view the command renders when no branch picks another.
    pub default_view: String,
    /// Human label, used for navigation menus.
    pub label: String,
    /// Optional long description shown on the landing page.
    pub informative: Option<String>,
    /// Menu position.
    pub ordinal: i32,
}

impl CommandDescriptor {
    pub fn new(
        token: impl Into<String>,
        handler_name: impl Into<String>,
        default_view: impl Into<String>,
        label: impl Into<String>,
        ordinal: i32,
    ) -> Self {
        Self {
            token: token.into(),
            handler_name: handler_name.into(),
            default_view: default_view.into(),
            label: label.into(),
            informative: None,
            ordinal,
        }
    }

    pub fn with_informative(mut self, informative: impl Into<String>) -> Self {
        self.informative = Some(informative.into());
        self
    }

    /// Reject descriptors that cannot produce a working handler.
    pub fn validate(&self) -> DomainResult<()> {
        if self.token.trim().is_empty() {
            return Err(DomainError::missing("command token"));
        }
        if self.handler_name.trim().is_empty() {
            return Err(DomainError::missing(format!(
                "handler name for command '{}'",
                self.token
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_descriptor_passes() {
        let d = CommandDescriptor::new("conv", "AgreementsCommand", "landing", "Agreements", 10);
        assert!(d.validate().is_ok());
    }

    #[test]
    fn blank_token_is_rejected() {
        let d = CommandDescriptor::new("  ", "AgreementsCommand", "landing", "Agreements", 10);
        assert!(matches!(d.validate(), Err(DomainError::MissingAttribute(_))));
    }

    #[test]
    fn blank_handler_name_is_rejected() {
        let d = CommandDescriptor::new("conv", "", "landing", "Agreements", 10);
        assert!(matches!(d.validate(), Err(DomainError::MissingAttribute(_))));
    }
}
