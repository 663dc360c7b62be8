//! User aggregate implementation.

use common::AggregateId;
use event_store::Version;

use crate::aggregate::Aggregate;

use super::{
    EmailAddressWasChanged, UserError, UserEvent, WasRegisteredWithEmail,
    WasRegisteredWithFacebook, WasRegisteredWithGoogle, WasRemoved,
};

/// User aggregate root.
///
/// A user registers once, by email or through Google or Facebook, may change
/// the email address, and may be removed. Removal is terminal.
#[derive(Debug, Clone)]
pub struct User {
    id: AggregateId,
    version: Version,
    email: Option<String>,
    google_id: Option<String>,
    facebook_id: Option<String>,
    removed: bool,
    pending: Vec<UserEvent>,
}

impl Aggregate for User {
    type Event = UserEvent;

    fn aggregate_type() -> &'static str {
        "User"
    }

    fn blank(id: AggregateId) -> Self {
        Self {
            id,
            version: Version::initial(),
            email: None,
            google_id: None,
            facebook_id: None,
            removed: false,
            pending: Vec::new(),
        }
    }

    fn id(&self) -> AggregateId {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: &UserEvent) {
        match event {
            UserEvent::WasRegisteredWithEmail(data) => {
                self.email = Some(data.email.clone());
            }
            UserEvent::WasRegisteredWithGoogle(data) => {
                self.email = Some(data.email.clone());
                self.google_id = Some(data.google_id.clone());
            }
            UserEvent::WasRegisteredWithFacebook(data) => {
                self.email = Some(data.email.clone());
                self.facebook_id = Some(data.facebook_id.clone());
            }
            UserEvent::EmailAddressWasChanged(data) => {
                self.email = Some(data.email.clone());
            }
            UserEvent::WasRemoved(_) => {
                self.removed = true;
            }
        }
    }

    fn pending_events(&self) -> &[UserEvent] {
        &self.pending
    }

    fn pending_mut(&mut self) -> &mut Vec<UserEvent> {
        &mut self.pending
    }
}

// Query methods
impl User {
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn google_id(&self) -> Option<&str> {
        self.google_id.as_deref()
    }

    pub fn facebook_id(&self) -> Option<&str> {
        self.facebook_id.as_deref()
    }

    /// Returns true once any registration event has been applied.
    pub fn is_registered(&self) -> bool {
        self.email.is_some()
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }
}

// Command methods (record events)
impl User {
    /// Registers the user with an email address.
    pub fn register_with_email(&mut self, email: &str) -> Result<(), UserError> {
        self.ensure_unregistered()?;
        let email = validate_email(email)?;

        self.record(UserEvent::WasRegisteredWithEmail(WasRegisteredWithEmail {
            id: self.id,
            email,
        }));
        Ok(())
    }

    /// Registers the user through a Google account.
    pub fn register_with_google(
        &mut self,
        email: &str,
        google_id: &str,
        access_token: &str,
    ) -> Result<(), UserError> {
        self.ensure_unregistered()?;
        let email = validate_email(email)?;
        let google_id = require("google_id", google_id)?;

        self.record(UserEvent::WasRegisteredWithGoogle(WasRegisteredWithGoogle {
            id: self.id,
            email,
            google_id,
            access_token: access_token.to_string(),
        }));
        Ok(())
    }

    /// Registers the user through a Facebook account.
    pub fn register_with_facebook(
        &mut self,
        email: &str,
        facebook_id: &str,
        access_token: &str,
    ) -> Result<(), UserError> {
        self.ensure_unregistered()?;
        let email = validate_email(email)?;
        let facebook_id = require("facebook_id", facebook_id)?;

        self.record(UserEvent::WasRegisteredWithFacebook(
            WasRegisteredWithFacebook {
                id: self.id,
                email,
                facebook_id,
                access_token: access_token.to_string(),
            },
        ));
        Ok(())
    }

    /// Changes the email address.
    ///
    /// Changing to the current address records nothing.
    pub fn change_email_address(&mut self, email: &str) -> Result<(), UserError> {
        self.ensure_active()?;
        let email = validate_email(email)?;

        if self.email.as_deref() == Some(email.as_str()) {
            return Ok(());
        }

        self.record(UserEvent::EmailAddressWasChanged(EmailAddressWasChanged {
            id: self.id,
            email,
        }));
        Ok(())
    }

    /// Removes the user.
    pub fn remove(&mut self) -> Result<(), UserError> {
        self.ensure_active()?;

        self.record(UserEvent::WasRemoved(WasRemoved { id: self.id }));
        Ok(())
    }

    fn ensure_unregistered(&self) -> Result<(), UserError> {
        if self.removed {
            return Err(UserError::Removed(self.id));
        }
        if self.is_registered() {
            return Err(UserError::AlreadyRegistered(self.id));
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), UserError> {
        if self.removed {
            return Err(UserError::Removed(self.id));
        }
        if !self.is_registered() {
            return Err(UserError::NotRegistered(self.id));
        }
        Ok(())
    }
}

fn validate_email(email: &str) -> Result<String, UserError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(UserError::InvalidEmail(email.to_string()));
    }
    Ok(email.to_string())
}

fn require(field: &'static str, value: &str) -> Result<String, UserError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(UserError::MissingField(field));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered() -> User {
        let mut user = User::blank(AggregateId::new());
        user.register_with_email("a@b.com").unwrap();
        user
    }

    #[test]
    fn register_with_email_records_event() {
        let user = registered();

        assert_eq!(user.email(), Some("a@b.com"));
        assert_eq!(
            user.pending_events(),
            &[UserEvent::WasRegisteredWithEmail(WasRegisteredWithEmail {
                id: user.id(),
                email: "a@b.com".into(),
            })]
        );
    }

    #[test]
    fn register_twice_is_invalid_state() {
        let mut user = registered();

        let result = user.register_with_google("a@b.com", "g-1", "token");

        assert!(matches!(result, Err(UserError::AlreadyRegistered(_))));
        assert_eq!(user.pending_events().len(), 1);
    }

    #[test]
    fn invalid_emails_are_rejected() {
        for email in ["", "   ", "no-at-sign"] {
            let mut user = User::blank(AggregateId::new());
            assert!(matches!(
                user.register_with_email(email),
                Err(UserError::InvalidEmail(_))
            ));
            assert!(user.pending_events().is_empty());
        }
    }

    #[test]
    fn social_registration_requires_provider_id() {
        let mut user = User::blank(AggregateId::new());
        assert!(matches!(
            user.register_with_facebook("a@b.com", " ", "token"),
            Err(UserError::MissingField("facebook_id"))
        ));

        user.register_with_facebook("a@b.com", "fb-1", "token")
            .unwrap();
        assert_eq!(user.facebook_id(), Some("fb-1"));
        assert!(user.google_id().is_none());
    }

    #[test]
    fn changing_to_same_email_records_nothing() {
        let mut user = registered();
        user.take_pending();

        user.change_email_address("a@b.com").unwrap();

        assert!(user.pending_events().is_empty());
    }

    #[test]
    fn change_email_records_event() {
        let mut user = registered();
        user.take_pending();

        user.change_email_address("new@b.com").unwrap();

        assert_eq!(user.email(), Some("new@b.com"));
        assert_eq!(user.pending_events().len(), 1);
    }

    #[test]
    fn removed_user_rejects_every_mutation() {
        let mut user = registered();
        user.remove().unwrap();
        user.take_pending();

        assert!(matches!(user.remove(), Err(UserError::Removed(_))));
        assert!(matches!(
            user.change_email_address("x@y.com"),
            Err(UserError::Removed(_))
        ));
        assert!(matches!(
            user.register_with_email("x@y.com"),
            Err(UserError::Removed(_))
        ));
        assert!(user.pending_events().is_empty());
    }

    #[test]
    fn unregistered_user_cannot_be_removed() {
        let mut user = User::blank(AggregateId::new());
        assert!(matches!(user.remove(), Err(UserError::NotRegistered(_))));
    }

    #[test]
    fn replay_matches_live_state() {
        let mut live = User::blank(AggregateId::new());
        live.register_with_google("a@b.com", "g-1", "token").unwrap();
        live.change_email_address("c@d.com").unwrap();
        live.remove().unwrap();
        let history = live.take_pending();

        let mut replayed = User::blank(live.id());
        replayed.replay(history);

        assert_eq!(replayed.email(), live.email());
        assert_eq!(replayed.google_id(), live.google_id());
        assert_eq!(replayed.is_removed(), live.is_removed());
        assert_eq!(replayed.version(), Version::new(3));
    }
}
