//! Fault taxonomy for registry construction and request dispatch.

use thiserror::Error;

use col_auth::AuthError;
use col_core::DomainError;
use col_storage::StorageError;

/// Log severity a fault should be reported at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Severe,
}

/// Registry construction failure. Always fatal: the process must not serve
/// requests with a partially built command table.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("loading command descriptors failed: {0}")]
    Storage(#[from] StorageError),

    #[error("descriptor for '{token}' is invalid: {reason}")]
    InvalidDescriptor { token: String, reason: String },

    #[error("duplicate command token '{token}'")]
    DuplicateToken { token: String },

    #[error("no handler registered under name '{handler_name}' (command '{token}')")]
    UnknownHandler { token: String, handler_name: String },

    #[error("command '{token}' has no default view")]
    MissingView { token: String },

    #[error("home token '{token}' resolves to no command")]
    MissingHome { token: String },
}

/// Business-level failure raised by a command handler.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("{0}")]
    Invalid(String),
}

impl CommandError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Request-scoped dispatch failure, mapped onto the error view by the
/// front controller.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request itself could not be read (malformed query string).
    #[error("malformed request: {0}")]
    BadRequest(String),

    /// The token resolved to no registered command.
    #[error("unknown command token '{token}'")]
    CommandNotFound { token: String },

    /// The handler ran and refused.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Anything that should never happen during normal operation.
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl DispatchError {
    /// Business faults and unknown tokens are expected traffic noise;
    /// everything else indicates a defect or an outage.
    pub fn severity(&self) -> Severity {
        match self {
            Self::CommandNotFound { .. } | Self::Command(_) => Severity::Warning,
            Self::BadRequest(_) | Self::Unexpected(_) => Severity::Severe,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_split() {
        assert_eq!(
            DispatchError::CommandNotFound { token: "xx".into() }.severity(),
            Severity::Warning
        );
        assert_eq!(
            DispatchError::Command(CommandError::invalid("bad id")).severity(),
            Severity::Warning
        );
        assert_eq!(
            DispatchError::Unexpected("boom".into()).severity(),
            Severity::Severe
        );
        assert_eq!(
            DispatchError::BadRequest("bad query".into()).severity(),
            Severity::Severe
        );
    }
}
