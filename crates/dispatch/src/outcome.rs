//! Typed command result.
//!
//! Handlers return a [`CommandOutcome`] instead of poking attributes into a
//! shared bag: the view to render, an optional redirect, and whichever
//! domain payloads the view needs. The front controller serializes the whole
//! thing after decorating it with request-independent context.

use serde::Serialize;

use col_agreements::{Agreement, CodeItem, Contractor};

#[derive(Debug, Clone, Serialize)]
pub struct CommandOutcome {
    /// Logical view name the template layer resolves.
    pub view: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    /// When set, the controller answers with a redirect to
    /// `{base}/?{redirect}` instead of rendering the view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreement: Option<Agreement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreements: Option<Vec<Agreement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contractor: Option<Contractor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contractors: Option<Vec<Contractor>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<CodeItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<CodeItem>,
    /// Header visibility; `None` means "controller default" (visible).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<bool>,
    /// Footer visibility; `None` means "controller default" (visible).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<bool>,
}

impl CommandOutcome {
    pub fn view(name: impl Into<String>) -> Self {
        Self {
            view: name.into(),
            page_title: None,
            redirect: None,
            agreement: None,
            agreements: None,
            contractor: None,
            contractors: None,
            kinds: Vec::new(),
            scopes: Vec::new(),
            header: None,
            footer: None,
        }
    }

    pub fn redirect_to(query: impl Into<String>) -> Self {
        let mut outcome = Self::view("");
        outcome.redirect = Some(query.into());
        outcome
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.page_title = Some(title.into());
        self
    }

    pub fn with_agreement(mut self, agreement: Agreement) -> Self {
        self.agreement = Some(agreement);
        self
    }

    pub fn with_agreements(mut self, agreements: Vec<Agreement>) -> Self {
        self.agreements = Some(agreements);
        self
    }

    pub fn with_contractor(mut self, contractor: Contractor) -> Self {
        self.contractor = Some(contractor);
        self
    }

    pub fn with_contractors(mut self, contractors: Vec<Contractor>) -> Self {
        self.contractors = Some(contractors);
        self
    }

    pub fn with_kinds(mut self, kinds: Vec<CodeItem>) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<CodeItem>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn chromeless(mut self) -> Self {
        self.header = Some(false);
        self.footer = Some(false);
        self
    }

    pub fn is_redirect(&self) -> bool {
        self.redirect.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_round() {
        let outcome = CommandOutcome::view("landing").titled("Agreements");
        assert_eq!(outcome.view, "landing");
        assert_eq!(outcome.page_title.as_deref(), Some("Agreements"));
        assert!(!outcome.is_redirect());
        assert!(outcome.header.is_none());
    }

    #[test]
    fn redirect_outcome() {
        let outcome = CommandOutcome::redirect_to("ent=conv&op=sel&id=3");
        assert!(outcome.is_redirect());
        assert_eq!(outcome.redirect.as_deref(), Some("ent=conv&op=sel&id=3"));
    }
}
