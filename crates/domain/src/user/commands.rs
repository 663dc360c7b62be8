//! User commands.

use std::fmt;
use std::str::FromStr;

use common::AggregateId;
use dispatch::Message;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::DomainError;

/// Command to register a user with an email address.
///
/// A missing `id` is generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterWithEmail {
    #[serde(default)]
    pub id: AggregateId,
    pub email: String,
}

/// Command to register a user through a Google account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterWithGoogle {
    #[serde(default)]
    pub id: AggregateId,
    pub email: String,
    pub google_id: String,
    pub access_token: String,
}

/// Command to register a user through a Facebook account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterWithFacebook {
    #[serde(default)]
    pub id: AggregateId,
    pub email: String,
    pub facebook_id: String,
    pub access_token: String,
}

/// Command to change a user's email address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEmailAddress {
    pub id: AggregateId,
    pub email: String,
}

/// Command to remove a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveUser {
    pub id: AggregateId,
}

/// Every command the user aggregate accepts.
#[derive(Debug, Clone)]
pub enum UserCommand {
    RegisterWithEmail(RegisterWithEmail),
    RegisterWithGoogle(RegisterWithGoogle),
    RegisterWithFacebook(RegisterWithFacebook),
    ChangeEmailAddress(ChangeEmailAddress),
    RemoveUser(RemoveUser),
}

/// Kind tag of a [`UserCommand`]; also its name on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserCommandKind {
    RegisterWithEmail,
    RegisterWithGoogle,
    RegisterWithFacebook,
    ChangeEmailAddress,
    RemoveUser,
}

impl UserCommandKind {
    pub const ALL: [UserCommandKind; 5] = [
        UserCommandKind::RegisterWithEmail,
        UserCommandKind::RegisterWithGoogle,
        UserCommandKind::RegisterWithFacebook,
        UserCommandKind::ChangeEmailAddress,
        UserCommandKind::RemoveUser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserCommandKind::RegisterWithEmail => "RegisterWithEmail",
            UserCommandKind::RegisterWithGoogle => "RegisterWithGoogle",
            UserCommandKind::RegisterWithFacebook => "RegisterWithFacebook",
            UserCommandKind::ChangeEmailAddress => "ChangeEmailAddress",
            UserCommandKind::RemoveUser => "RemoveUser",
        }
    }
}

impl fmt::Display for UserCommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserCommandKind {
    type Err = DomainError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| DomainError::InvalidArgument(format!("unknown command: {name}")))
    }
}

impl UserCommand {
    /// Builds a command from its wire name and JSON payload.
    ///
    /// Unknown names and malformed payloads are
    /// [`DomainError::InvalidArgument`].
    pub fn decode(name: &str, payload: &[u8]) -> Result<Self, DomainError> {
        let command = match name.parse::<UserCommandKind>()? {
            UserCommandKind::RegisterWithEmail => {
                UserCommand::RegisterWithEmail(parse(name, payload)?)
            }
            UserCommandKind::RegisterWithGoogle => {
                UserCommand::RegisterWithGoogle(parse(name, payload)?)
            }
            UserCommandKind::RegisterWithFacebook => {
                UserCommand::RegisterWithFacebook(parse(name, payload)?)
            }
            UserCommandKind::ChangeEmailAddress => {
                UserCommand::ChangeEmailAddress(parse(name, payload)?)
            }
            UserCommandKind::RemoveUser => UserCommand::RemoveUser(parse(name, payload)?),
        };
        Ok(command)
    }

    /// Returns the id of the user the command targets.
    pub fn user_id(&self) -> AggregateId {
        match self {
            UserCommand::RegisterWithEmail(c) => c.id,
            UserCommand::RegisterWithGoogle(c) => c.id,
            UserCommand::RegisterWithFacebook(c) => c.id,
            UserCommand::ChangeEmailAddress(c) => c.id,
            UserCommand::RemoveUser(c) => c.id,
        }
    }
}

fn parse<T: DeserializeOwned>(name: &str, payload: &[u8]) -> Result<T, DomainError> {
    serde_json::from_slice(payload)
        .map_err(|e| DomainError::InvalidArgument(format!("invalid {name} payload: {e}")))
}

impl Message for UserCommand {
    type Kind = UserCommandKind;

    fn kind(&self) -> UserCommandKind {
        match self {
            UserCommand::RegisterWithEmail(_) => UserCommandKind::RegisterWithEmail,
            UserCommand::RegisterWithGoogle(_) => UserCommandKind::RegisterWithGoogle,
            UserCommand::RegisterWithFacebook(_) => UserCommandKind::RegisterWithFacebook,
            UserCommand::ChangeEmailAddress(_) => UserCommandKind::ChangeEmailAddress,
            UserCommand::RemoveUser(_) => UserCommandKind::RemoveUser,
        }
    }
}
