//! User aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod handlers;

pub use aggregate::User;
pub use commands::{
    ChangeEmailAddress, RegisterWithEmail, RegisterWithFacebook, RegisterWithGoogle, RemoveUser,
    UserCommand, UserCommandKind,
};
pub use events::{
    EmailAddressWasChanged, UserEvent, UserEventKind, WasRegisteredWithEmail,
    WasRegisteredWithFacebook, WasRegisteredWithGoogle, WasRemoved,
};
pub use handlers::{
    OnChangeEmailAddress, OnRegisterWithEmail, OnRegisterWithFacebook, OnRegisterWithGoogle,
    OnRemoveUser, register_user_handlers,
};

use common::AggregateId;
use thiserror::Error;

use crate::error::DomainError;

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("User {0} is already registered")]
    AlreadyRegistered(AggregateId),

    #[error("User {0} is not registered")]
    NotRegistered(AggregateId),

    /// Removal is terminal; every later mutation fails with this.
    #[error("User {0} was removed")]
    Removed(AggregateId),

    #[error("Invalid email address: {0:?}")]
    InvalidEmail(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

impl From<UserError> for DomainError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::AlreadyRegistered(_) | UserError::NotRegistered(_) | UserError::Removed(_) => {
                DomainError::InvalidState(err.to_string())
            }
            UserError::InvalidEmail(_) | UserError::MissingField(_) => {
                DomainError::InvalidArgument(err.to_string())
            }
        }
    }
}
