//! Command and event dispatch.
//!
//! - [`CommandBus`] routes each command to exactly one [`CommandHandler`],
//!   runs it on a detached task and reports the outcome on a reply channel
//! - [`EventBus`] fans an event out to every [`EventHandler`] subscribed to
//!   its kind, each on its own task
//! - [`contain`] converts a panic inside a handler into
//!   [`DispatchError::Internal`]
//!
//! Both buses are keyed by an enumerated [`Message::Kind`] tag and are
//! populated through `&mut self` during startup, then shared immutably.

pub mod command_bus;
pub mod containment;
pub mod error;
pub mod event_bus;
pub mod message;

pub use command_bus::{CommandBus, CommandHandler, CommandResult, command_handler_fn};
pub use containment::contain;
pub use error::DispatchError;
pub use event_bus::{EventBus, EventHandler, event_handler_fn};
pub use message::Message;
