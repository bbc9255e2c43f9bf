//! Concrete command handlers.

pub mod agreements;
pub mod deadlines;
pub mod home;

pub use agreements::{AgreementsCommand, OBJECT_CONTRACTOR};
pub use deadlines::DeadlinesCommand;
pub use home::HomeCommand;
