//! User domain events.

use std::fmt;

use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

/// Events that can occur on a user aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum UserEvent {
    WasRegisteredWithEmail(WasRegisteredWithEmail),
    WasRegisteredWithGoogle(WasRegisteredWithGoogle),
    WasRegisteredWithFacebook(WasRegisteredWithFacebook),
    EmailAddressWasChanged(EmailAddressWasChanged),
    WasRemoved(WasRemoved),
}

/// Kind tag of a [`UserEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserEventKind {
    WasRegisteredWithEmail,
    WasRegisteredWithGoogle,
    WasRegisteredWithFacebook,
    EmailAddressWasChanged,
    WasRemoved,
}

impl UserEventKind {
    pub const ALL: [UserEventKind; 5] = [
        UserEventKind::WasRegisteredWithEmail,
        UserEventKind::WasRegisteredWithGoogle,
        UserEventKind::WasRegisteredWithFacebook,
        UserEventKind::EmailAddressWasChanged,
        UserEventKind::WasRemoved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserEventKind::WasRegisteredWithEmail => "WasRegisteredWithEmail",
            UserEventKind::WasRegisteredWithGoogle => "WasRegisteredWithGoogle",
            UserEventKind::WasRegisteredWithFacebook => "WasRegisteredWithFacebook",
            UserEventKind::EmailAddressWasChanged => "EmailAddressWasChanged",
            UserEventKind::WasRemoved => "WasRemoved",
        }
    }
}

impl fmt::Display for UserEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DomainEvent for UserEvent {
    type Kind = UserEventKind;

    fn kind(&self) -> UserEventKind {
        match self {
            UserEvent::WasRegisteredWithEmail(_) => UserEventKind::WasRegisteredWithEmail,
            UserEvent::WasRegisteredWithGoogle(_) => UserEventKind::WasRegisteredWithGoogle,
            UserEvent::WasRegisteredWithFacebook(_) => UserEventKind::WasRegisteredWithFacebook,
            UserEvent::EmailAddressWasChanged(_) => UserEventKind::EmailAddressWasChanged,
            UserEvent::WasRemoved(_) => UserEventKind::WasRemoved,
        }
    }
}

impl UserEvent {
    /// Returns the id of the user the event belongs to.
    pub fn user_id(&self) -> AggregateId {
        match self {
            UserEvent::WasRegisteredWithEmail(e) => e.id,
            UserEvent::WasRegisteredWithGoogle(e) => e.id,
            UserEvent::WasRegisteredWithFacebook(e) => e.id,
            UserEvent::EmailAddressWasChanged(e) => e.id,
            UserEvent::WasRemoved(e) => e.id,
        }
    }
}

/// Data for WasRegisteredWithEmail event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WasRegisteredWithEmail {
    pub id: AggregateId,
    pub email: String,
}

/// Data for WasRegisteredWithGoogle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WasRegisteredWithGoogle {
    pub id: AggregateId,
    pub email: String,
    pub google_id: String,
    pub access_token: String,
}

/// Data for WasRegisteredWithFacebook event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WasRegisteredWithFacebook {
    pub id: AggregateId,
    pub email: String,
    pub facebook_id: String,
    pub access_token: String,
}

/// Data for EmailAddressWasChanged event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddressWasChanged {
    pub id: AggregateId,
    pub email: String,
}

/// Data for WasRemoved event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WasRemoved {
    pub id: AggregateId,
}
