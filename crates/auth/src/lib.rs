//! `col-auth` — authentication boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: sessions are
//! an opaque seam, and the protocol that mints them lives elsewhere.

pub mod principal;
pub mod roles;
pub mod session;

pub use principal::Principal;
pub use roles::Role;
pub use session::{AuthError, InMemorySessions, SessionManager};
