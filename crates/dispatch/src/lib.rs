//! `col-dispatch` — command resolution and execution.
//!
//! The front controller hands every request to this crate: a token resolves
//! through the [`CommandRegistry`] (built once at startup from storage), the
//! matched [`CommandHandler`] executes, and a typed [`CommandOutcome`] comes
//! back for rendering. Handlers are constructed through a compile-time
//! factory table; there is no runtime class loading and no global state.

pub mod commands;
pub mod context;
pub mod error;
pub mod handler;
pub mod outcome;
pub mod registry;

pub use context::{RequestContext, DEFAULT_OBJECT, OP_DELETE, OP_INSERT, OP_SEARCH, OP_SELECT, OP_UPDATE};
pub use error::{CommandError, DispatchError, RegistryError, Severity};
pub use handler::{builtin_factories, CommandHandler, HandlerFactory};
pub use outcome::CommandOutcome;
pub use registry::{CommandRegistry, MenuEntry};
