//! Handler contract and the compile-time factory table.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use col_core::CommandDescriptor;
use col_storage::StorageGateway;

use crate::commands::{AgreementsCommand, DeadlinesCommand, HomeCommand};
use crate::context::RequestContext;
use crate::error::{CommandError, RegistryError};
use crate::outcome::CommandOutcome;

/// A dispatchable command.
///
/// Implementations are constructed once at startup (through the factory
/// table) and shared across requests, so they hold no per-request state.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// The descriptor this handler was built from.
    fn descriptor(&self) -> &CommandDescriptor;

    /// Run the command against the current request.
    async fn execute(&self, ctx: &RequestContext) -> Result<CommandOutcome, CommandError>;
}

impl std::fmt::Debug for dyn CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("token", &self.descriptor().token)
            .finish()
    }
}

/// Constructor for one handler kind. Fails fast on a descriptor the handler
/// cannot work with (e.g. a missing default view).
pub type HandlerFactory =
    fn(CommandDescriptor, Arc<dyn StorageGateway>) -> Result<Box<dyn CommandHandler>, RegistryError>;

/// Ensure the descriptor names a view before a handler is built from it.
pub(crate) fn require_view(descriptor: &CommandDescriptor) -> Result<(), RegistryError> {
    if descriptor.default_view.trim().is_empty() {
        return Err(RegistryError::MissingView {
            token: descriptor.token.clone(),
        });
    }
    Ok(())
}

/// The full handler catalogue, keyed by the `handler_name` column of the
/// command table. Adding a command means adding a row there and an entry
/// here.
pub fn builtin_factories() -> HashMap<&'static str, HandlerFactory> {
    let mut factories: HashMap<&'static str, HandlerFactory> = HashMap::new();
    factories.insert("AgreementsCommand", |descriptor, gateway| {
        Ok(Box::new(AgreementsCommand::new(descriptor, gateway)?))
    });
    factories.insert("DeadlinesCommand", |descriptor, gateway| {
        Ok(Box::new(DeadlinesCommand::new(descriptor, gateway)?))
    });
    factories.insert("HomeCommand", |descriptor, gateway| {
        Ok(Box::new(HomeCommand::new(descriptor, gateway)?))
    });
    factories
}

#[cfg(test)]
mod tests {
    use super::*;
    use col_storage::InMemoryGateway;

    #[test]
    fn catalogue_builds_every_builtin() {
        let gateway: Arc<dyn StorageGateway> = Arc::new(InMemoryGateway::new());
        let factories = builtin_factories();
        for (name, factory) in &factories {
            let descriptor =
                CommandDescriptor::new("tok", name.to_string(), "someView", "Label", 1);
            let handler = factory(descriptor, Arc::clone(&gateway)).unwrap();
            assert_eq!(handler.descriptor().handler_name, *name);
        }
    }

    #[test]
    fn missing_view_fails_construction() {
        let gateway: Arc<dyn StorageGateway> = Arc::new(InMemoryGateway::new());
        let factories = builtin_factories();
        let factory = factories.get("AgreementsCommand").unwrap();
        let descriptor = CommandDescriptor::new("conv", "AgreementsCommand", "  ", "Label", 1);
        let err = factory(descriptor, gateway).unwrap_err();
        assert!(matches!(err, RegistryError::MissingView { token } if token == "conv"));
    }
}
