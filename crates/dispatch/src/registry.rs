//! Immutable command registry.
//!
//! Built once at startup from the command table; after that it is shared
//! read-only behind an `Arc` and lookups are O(1). Construction is
//! all-or-nothing: if any descriptor fails to produce a handler, the whole
//! load fails and the caller aborts startup.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use col_storage::StorageGateway;

use crate::error::{DispatchError, RegistryError};
use crate::handler::{CommandHandler, HandlerFactory};

/// One navigation entry, derived from a command descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuEntry {
    pub token: String,
    pub label: String,
    pub ordinal: i32,
}

pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn CommandHandler>>,
    menu: Vec<MenuEntry>,
    home_token: String,
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("menu", &self.menu)
            .field("home_token", &self.home_token)
            .finish()
    }
}

impl CommandRegistry {
    /// Load descriptors from storage and build every handler through the
    /// factory table.
    pub async fn load(
        gateway: Arc<dyn StorageGateway>,
        factories: &HashMap<&'static str, HandlerFactory>,
        home_token: impl Into<String>,
    ) -> Result<Self, RegistryError> {
        let home_token = home_token.into();
        let descriptors = gateway.load_command_descriptors().await?;

        let mut commands: HashMap<String, Arc<dyn CommandHandler>> = HashMap::new();
        let mut menu = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            descriptor
                .validate()
                .map_err(|e| RegistryError::InvalidDescriptor {
                    token: descriptor.token.clone(),
                    reason: e.to_string(),
                })?;
            if commands.contains_key(&descriptor.token) {
                return Err(RegistryError::DuplicateToken {
                    token: descriptor.token,
                });
            }
            let factory = factories.get(descriptor.handler_name.as_str()).ok_or_else(|| {
                RegistryError::UnknownHandler {
                    token: descriptor.token.clone(),
                    handler_name: descriptor.handler_name.clone(),
                }
            })?;
            menu.push(MenuEntry {
                token: descriptor.token.clone(),
                label: descriptor.label.clone(),
                ordinal: descriptor.ordinal,
            });
            let handler = factory(descriptor, Arc::clone(&gateway))?;
            commands.insert(handler.descriptor().token.clone(), Arc::from(handler));
        }

        if !commands.contains_key(&home_token) {
            return Err(RegistryError::MissingHome { token: home_token });
        }
        menu.sort_by_key(|e| e.ordinal);

        info!(commands = commands.len(), home = %home_token, "command registry built");
        Ok(Self {
            commands,
            menu,
            home_token,
        })
    }

    /// Resolve a token to its handler. An absent or blank token falls back
    /// to the home command; an unregistered one is a dispatch error.
    pub fn lookup(&self, token: Option<&str>) -> Result<Arc<dyn CommandHandler>, DispatchError> {
        let token = match token.map(str::trim) {
            None | Some("") => self.home_token.as_str(),
            Some(t) => t,
        };
        self.commands
            .get(token)
            .cloned()
            .ok_or_else(|| DispatchError::CommandNotFound {
                token: token.to_string(),
            })
    }

    /// Navigation entries in menu order.
    pub fn menu(&self) -> &[MenuEntry] {
        &self.menu
    }

    pub fn home_token(&self) -> &str {
        &self.home_token
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::builtin_factories;
    use col_core::CommandDescriptor;
    use col_storage::InMemoryGateway;

    fn descriptors() -> Vec<CommandDescriptor> {
        vec![
            CommandDescriptor::new("home", "HomeCommand", "landing", "Home", 1),
            CommandDescriptor::new("conv", "AgreementsCommand", "landing", "Agreements", 10),
            CommandDescriptor::new("sc", "DeadlinesCommand", "deadlines", "Deadlines", 20),
        ]
    }

    fn seeded_gateway(descriptors: Vec<CommandDescriptor>) -> Arc<dyn StorageGateway> {
        let mut gateway = InMemoryGateway::new();
        for d in descriptors {
            gateway = gateway.with_descriptor(d);
        }
        Arc::new(gateway)
    }

    async fn registry() -> CommandRegistry {
        CommandRegistry::load(seeded_gateway(descriptors()), &builtin_factories(), "home")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn lookup_is_identity_stable() {
        let registry = registry().await;
        let first = registry.lookup(Some("conv")).unwrap();
        let second = registry.lookup(Some("conv")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn blank_token_falls_back_to_home() {
        let registry = registry().await;
        for token in [None, Some(""), Some("   ")] {
            let handler = registry.lookup(token).unwrap();
            assert_eq!(handler.descriptor().token, "home");
        }
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let registry = registry().await;
        let err = registry.lookup(Some("nope")).unwrap_err();
        assert!(matches!(err, DispatchError::CommandNotFound { token } if token == "nope"));
    }

    #[tokio::test]
    async fn descriptor_views_survive_loading() {
        let registry = registry().await;
        let conv = registry.lookup(Some("conv")).unwrap();
        assert_eq!(conv.descriptor().default_view, "landing");
        let sc = registry.lookup(Some("sc")).unwrap();
        assert_eq!(sc.descriptor().default_view, "deadlines");
    }

    #[tokio::test]
    async fn unknown_handler_name_fails_whole_build() {
        let mut ds = descriptors();
        ds.push(CommandDescriptor::new("bad", "NoSuchCommand", "view", "Bad", 30));
        let err = CommandRegistry::load(seeded_gateway(ds), &builtin_factories(), "home")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownHandler { .. }));
    }

    #[tokio::test]
    async fn duplicate_token_fails_whole_build() {
        let mut ds = descriptors();
        ds.push(CommandDescriptor::new("conv", "AgreementsCommand", "v", "Dup", 40));
        let err = CommandRegistry::load(seeded_gateway(ds), &builtin_factories(), "home")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateToken { token } if token == "conv"));
    }

    #[tokio::test]
    async fn missing_home_fails_build() {
        let ds = vec![CommandDescriptor::new(
            "conv",
            "AgreementsCommand",
            "landing",
            "Agreements",
            10,
        )];
        let err = CommandRegistry::load(seeded_gateway(ds), &builtin_factories(), "home")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::MissingHome { .. }));
    }

    #[tokio::test]
    async fn storage_failure_fails_build() {
        let gateway = InMemoryGateway::new();
        gateway.set_failing(true);
        let err = CommandRegistry::load(Arc::new(gateway), &builtin_factories(), "home")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Storage(_)));
    }

    #[tokio::test]
    async fn menu_is_sorted_by_ordinal() {
        let registry = registry().await;
        let tokens: Vec<&str> = registry.menu().iter().map(|e| e.token.as_str()).collect();
        assert_eq!(tokens, vec!["home", "conv", "sc"]);
    }
}
