//! Deadlines command: agreements expiring inside a date window.
//!
//! The same window query feeds the notification loop; this command is the
//! interactive face of it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use col_core::{CommandDescriptor, DateWindow};
use col_storage::StorageGateway;

use crate::context::{RequestContext, END_OF_TIME_DATE, UNIX_EPOCH_DATE};
use crate::error::{CommandError, RegistryError};
use crate::handler::{require_view, CommandHandler};
use crate::outcome::CommandOutcome;

pub struct DeadlinesCommand {
    descriptor: CommandDescriptor,
    gateway: Arc<dyn StorageGateway>,
}

impl DeadlinesCommand {
    pub fn new(
        descriptor: CommandDescriptor,
        gateway: Arc<dyn StorageGateway>,
    ) -> Result<Self, RegistryError> {
        require_view(&descriptor)?;
        Ok(Self { descriptor, gateway })
    }

    /// Window from request parameters; with none given it spans all time.
    fn window(ctx: &RequestContext) -> DateWindow {
        DateWindow::new(
            ctx.date_param_or("start", UNIX_EPOCH_DATE),
            ctx.date_param_or("end", END_OF_TIME_DATE),
        )
    }
}

#[async_trait]
impl CommandHandler for DeadlinesCommand {
    fn descriptor(&self) -> &CommandDescriptor {
        &self.descriptor
    }

    async fn execute(&self, ctx: &RequestContext) -> Result<CommandOutcome, CommandError> {
        if ctx.is_write() {
            warn!(op = ctx.op(), "deadlines command is read-only, listing instead");
        }
        if let Some(id) = ctx.id() {
            let agreement = self.gateway.agreement(ctx.principal(), id).await?;
            return Ok(CommandOutcome::view("agreement")
                .titled("Agreement")
                .with_agreement(agreement));
        }
        let window = Self::window(ctx);
        let agreements = self
            .gateway
            .agreements_expiring(ctx.principal().groups(), window)
            .await?;
        Ok(CommandOutcome::view(self.descriptor.default_view.clone())
            .titled(self.descriptor.label.clone())
            .with_agreements(agreements))
    }
}
