//! Mail transport seam.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use col_core::RecipientGroupId;

/// A group of addresses that receive one shared summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientGroup {
    pub id: RecipientGroupId,
    pub name: String,
    pub recipients: Vec<String>,
}

impl RecipientGroup {
    pub fn new(id: RecipientGroupId, name: impl Into<String>, recipients: Vec<String>) -> Self {
        Self {
            id,
            name: name.into(),
            recipients,
        }
    }
}

/// A composed message, transport-agnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MailError {
    #[error("no recipients")]
    NoRecipients,

    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Sends composed messages. Implementations own the actual transport
/// (SMTP relay, API, spool directory); this crate never sees it.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> Result<(), MailError>;
}

#[async_trait]
impl<M> Mailer for Arc<M>
where
    M: Mailer + ?Sized,
{
    async fn send(&self, message: OutboundMessage) -> Result<(), MailError> {
        (**self).send(message).await
    }
}

/// Mailer that only logs, for deployments without an outbound relay.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMailer;

#[async_trait]
impl Mailer for LoggingMailer {
    async fn send(&self, message: OutboundMessage) -> Result<(), MailError> {
        if message.recipients.is_empty() {
            return Err(MailError::NoRecipients);
        }
        tracing::info!(
            recipients = message.recipients.len(),
            subject = %message.subject,
            "outbound summary (logging transport)"
        );
        Ok(())
    }
}

/// Recording mailer for tests and dev mode.
///
/// Deliveries land in an inspectable outbox; addresses registered through
/// [`fail_for`](Self::fail_for) make the whole send fail, for exercising the
/// per-group isolation of the notification loop.
#[derive(Debug, Default)]
pub struct InMemoryMailer {
    outbox: Mutex<Vec<OutboundMessage>>,
    failing: Mutex<HashSet<String>>,
}

impl InMemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, recipient: impl Into<String>) {
        self.failing.lock().unwrap().insert(recipient.into());
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.outbox.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for InMemoryMailer {
    async fn send(&self, message: OutboundMessage) -> Result<(), MailError> {
        if message.recipients.is_empty() {
            return Err(MailError::NoRecipients);
        }
        let failing = self.failing.lock().unwrap();
        if let Some(bad) = message.recipients.iter().find(|r| failing.contains(*r)) {
            return Err(MailError::Delivery(format!("mailbox unavailable: {bad}")));
        }
        drop(failing);
        self.outbox.lock().unwrap().push(message);
        Ok(())
    }
}
