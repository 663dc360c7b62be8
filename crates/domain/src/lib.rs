//! Domain layer for the event-sourcing system.
//!
//! This crate provides:
//! - [`Aggregate`] and [`DomainEvent`] traits for event-sourced entities
//! - [`Repository`], which replays aggregates from the event log and saves
//!   and publishes their pending events
//! - The [`User`] aggregate with its commands, events and command handlers

pub mod aggregate;
pub mod error;
pub mod recorded;
pub mod repository;
pub mod user;

pub use aggregate::{Aggregate, DomainEvent};
pub use error::DomainError;
pub use recorded::{CORRELATION_ID_KEY, RecordedEvent};
pub use repository::Repository;
pub use user::{
    ChangeEmailAddress, EmailAddressWasChanged, RegisterWithEmail, RegisterWithFacebook,
    RegisterWithGoogle, RemoveUser, User, UserCommand, UserCommandKind, UserError, UserEvent,
    UserEventKind, WasRegisteredWithEmail, WasRegisteredWithFacebook, WasRegisteredWithGoogle,
    WasRemoved, register_user_handlers,
};
