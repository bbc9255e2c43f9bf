//! `col-notify` — expiry notifications.
//!
//! A periodic loop queries agreements expiring inside a configured window
//! and mails each recipient group a summary. Transport is behind the
//! [`Mailer`] seam; the loop takes an injected clock so tests never wait on
//! wall time.

pub mod mailer;
pub mod notifier;
pub mod schedule;

pub use mailer::{InMemoryMailer, LoggingMailer, MailError, Mailer, OutboundMessage, RecipientGroup};
pub use notifier::{Notifier, NotifierHandle, RunReport};
pub use schedule::{NotifierConfig, WindowPolicy};
