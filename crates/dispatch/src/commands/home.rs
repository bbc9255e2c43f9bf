//! Home command: the landing page and the registry's fallback target.

use std::sync::Arc;

use async_trait::async_trait;

use col_core::CommandDescriptor;
use col_storage::StorageGateway;

use crate::context::RequestContext;
use crate::error::{CommandError, RegistryError};
use crate::handler::{require_view, CommandHandler};
use crate::outcome::CommandOutcome;

pub struct HomeCommand {
    descriptor: CommandDescriptor,
    gateway: Arc<dyn StorageGateway>,
}

impl HomeCommand {
    pub fn new(
        descriptor: CommandDescriptor,
        gateway: Arc<dyn StorageGateway>,
    ) -> Result<Self, RegistryError> {
        require_view(&descriptor)?;
        Ok(Self { descriptor, gateway })
    }
}

#[async_trait]
impl CommandHandler for HomeCommand {
    fn descriptor(&self) -> &CommandDescriptor {
        &self.descriptor
    }

    async fn execute(&self, _ctx: &RequestContext) -> Result<CommandOutcome, CommandError> {
        let kinds = self.gateway.agreement_kinds().await?;
        let scopes = self.gateway.agreement_scopes().await?;
        Ok(CommandOutcome::view(self.descriptor.default_view.clone())
            .titled(self.descriptor.label.clone())
            .with_kinds(kinds)
            .with_scopes(scopes))
    }
}
