//! Command handlers for the user aggregate.

use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, Context};
use dispatch::{CommandBus, CommandHandler, CommandResult, DispatchError, Message};
use event_store::{EventStore, EventStoreError, Version};

use crate::aggregate::Aggregate;
use crate::error::DomainError;
use crate::repository::Repository;

use super::{User, UserCommand, UserCommandKind, UserError};

type UserRepository<S> = Repository<User, S>;

/// Saves a freshly registered user.
///
/// Registration starts from a blank aggregate instead of loading the stream,
/// so an existing stream shows up as a conflict at version 0. That conflict
/// means the user is already registered.
async fn create<S: EventStore>(
    repository: &UserRepository<S>,
    ctx: &Context,
    mut user: User,
) -> CommandResult {
    match repository.save(ctx, &mut user).await {
        Ok(_) => {
            tracing::info!(user_id = %user.id(), "user registered");
            Ok(())
        }
        Err(DomainError::EventStore(EventStoreError::ConcurrencyConflict {
            aggregate_id,
            expected,
            ..
        })) if expected == Version::initial() => {
            Err(DomainError::from(UserError::AlreadyRegistered(aggregate_id)).into())
        }
        Err(err) => Err(err.into()),
    }
}

/// Loads a user, applies `change`, and saves the result.
async fn modify<S, F>(
    repository: &UserRepository<S>,
    ctx: &Context,
    id: AggregateId,
    change: F,
) -> CommandResult
where
    S: EventStore,
    F: FnOnce(&mut User) -> Result<(), UserError>,
{
    let mut user = repository.get(ctx, id).await?;
    change(&mut user).map_err(DomainError::from)?;
    repository.save(ctx, &mut user).await?;
    Ok(())
}

fn unexpected(expected: UserCommandKind, command: &UserCommand) -> DispatchError {
    DispatchError::internal(format!(
        "{expected} handler received {} command",
        command.kind()
    ))
}

/// Handles [`UserCommand::RegisterWithEmail`].
pub struct OnRegisterWithEmail<S: EventStore> {
    repository: Arc<UserRepository<S>>,
}

impl<S: EventStore> OnRegisterWithEmail<S> {
    pub fn new(repository: Arc<UserRepository<S>>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl<S: EventStore + 'static> CommandHandler<UserCommand> for OnRegisterWithEmail<S> {
    async fn handle(&self, ctx: Context, command: UserCommand) -> CommandResult {
        let c = match command {
            UserCommand::RegisterWithEmail(c) => c,
            other => return Err(unexpected(UserCommandKind::RegisterWithEmail, &other)),
        };

        let mut user = User::blank(c.id);
        user.register_with_email(&c.email)
            .map_err(DomainError::from)?;
        create(&self.repository, &ctx, user).await
    }
}

/// Handles [`UserCommand::RegisterWithGoogle`].
pub struct OnRegisterWithGoogle<S: EventStore> {
    repository: Arc<UserRepository<S>>,
}

impl<S: EventStore> OnRegisterWithGoogle<S> {
    pub fn new(repository: Arc<UserRepository<S>>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl<S: EventStore + 'static> CommandHandler<UserCommand> for OnRegisterWithGoogle<S> {
    async fn handle(&self, ctx: Context, command: UserCommand) -> CommandResult {
        let c = match command {
            UserCommand::RegisterWithGoogle(c) => c,
            other => return Err(unexpected(UserCommandKind::RegisterWithGoogle, &other)),
        };

        let mut user = User::blank(c.id);
        user.register_with_google(&c.email, &c.google_id, &c.access_token)
            .map_err(DomainError::from)?;
        create(&self.repository, &ctx, user).await
    }
}

/// Handles [`UserCommand::RegisterWithFacebook`].
pub struct OnRegisterWithFacebook<S: EventStore> {
    repository: Arc<UserRepository<S>>,
}

impl<S: EventStore> OnRegisterWithFacebook<S> {
    pub fn new(repository: Arc<UserRepository<S>>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl<S: EventStore + 'static> CommandHandler<UserCommand> for OnRegisterWithFacebook<S> {
    async fn handle(&self, ctx: Context, command: UserCommand) -> CommandResult {
        let c = match command {
            UserCommand::RegisterWithFacebook(c) => c,
            other => return Err(unexpected(UserCommandKind::RegisterWithFacebook, &other)),
        };

        let mut user = User::blank(c.id);
        user.register_with_facebook(&c.email, &c.facebook_id, &c.access_token)
            .map_err(DomainError::from)?;
        create(&self.repository, &ctx, user).await
    }
}

/// Handles [`UserCommand::ChangeEmailAddress`].
pub struct OnChangeEmailAddress<S: EventStore> {
    repository: Arc<UserRepository<S>>,
}

impl<S: EventStore> OnChangeEmailAddress<S> {
    pub fn new(repository: Arc<UserRepository<S>>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl<S: EventStore + 'static> CommandHandler<UserCommand> for OnChangeEmailAddress<S> {
    async fn handle(&self, ctx: Context, command: UserCommand) -> CommandResult {
        let c = match command {
            UserCommand::ChangeEmailAddress(c) => c,
            other => return Err(unexpected(UserCommandKind::ChangeEmailAddress, &other)),
        };

        modify(&self.repository, &ctx, c.id, |user| {
            user.change_email_address(&c.email)
        })
        .await
    }
}

/// Handles [`UserCommand::RemoveUser`].
pub struct OnRemoveUser<S: EventStore> {
    repository: Arc<UserRepository<S>>,
}

impl<S: EventStore> OnRemoveUser<S> {
    pub fn new(repository: Arc<UserRepository<S>>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl<S: EventStore + 'static> CommandHandler<UserCommand> for OnRemoveUser<S> {
    async fn handle(&self, ctx: Context, command: UserCommand) -> CommandResult {
        let c = match command {
            UserCommand::RemoveUser(c) => c,
            other => return Err(unexpected(UserCommandKind::RemoveUser, &other)),
        };

        modify(&self.repository, &ctx, c.id, User::remove).await
    }
}

/// Registers a handler for every [`UserCommandKind`].
pub fn register_user_handlers<S: EventStore + 'static>(
    bus: &mut CommandBus<UserCommand>,
    repository: Arc<UserRepository<S>>,
) -> Result<(), DispatchError> {
    bus.subscribe(
        UserCommandKind::RegisterWithEmail,
        Arc::new(OnRegisterWithEmail::new(Arc::clone(&repository))),
    )?;
    bus.subscribe(
        UserCommandKind::RegisterWithGoogle,
        Arc::new(OnRegisterWithGoogle::new(Arc::clone(&repository))),
    )?;
    bus.subscribe(
        UserCommandKind::RegisterWithFacebook,
        Arc::new(OnRegisterWithFacebook::new(Arc::clone(&repository))),
    )?;
    bus.subscribe(
        UserCommandKind::ChangeEmailAddress,
        Arc::new(OnChangeEmailAddress::new(Arc::clone(&repository))),
    )?;
    bus.subscribe(
        UserCommandKind::RemoveUser,
        Arc::new(OnRemoveUser::new(repository)),
    )?;
    Ok(())
}
