use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role carried by a session principal.
///
/// Roles are opaque strings at this layer; what a role may see is decided by
/// the command handlers, mostly through group scoping rather than the role
/// name itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Default role assigned when the session carries none.
    pub fn user() -> Self {
        Self(Cow::Borrowed("user"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
