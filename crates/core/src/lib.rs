//! `col-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod command;
pub mod error;
pub mod id;
pub mod time;

pub use command::CommandDescriptor;
pub use error::{DomainError, DomainResult};
pub use id::{AgreementId, ContractorId, RecipientGroupId, UserId};
pub use time::{Clock, DateWindow, FixedClock, SystemClock};
