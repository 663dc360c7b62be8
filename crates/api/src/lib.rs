//! HTTP API server for the user command/event dispatch core.
//!
//! Commands arrive on `POST /dispatch/{command}` and are routed through the
//! [`CommandBus`]; queries are served from the [`UserView`] read model.
//! Logging goes through `tracing` and metrics through Prometheus.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use dispatch::{CommandBus, DispatchError, EventBus};
use domain::{Repository, User, UserCommand, register_user_handlers};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{UserView, register_user_projections};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub commands: Arc<CommandBus<UserCommand>>,
    pub users: Arc<UserView>,
    pub store: Arc<dyn EventStore>,
    pub command_timeout: Duration,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::live))
        .route("/readiness", get(routes::health::ready))
        .route("/dispatch/{command}", post(routes::commands::dispatch))
        .route("/users", get(routes::users::list))
        .route("/users/{id}", get(routes::users::get))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the buses, the users read model and the command handlers over
/// `store`.
///
/// Projections subscribe before the event bus is shared, and handlers
/// register before the command bus is shared, so both registries are
/// read-only once requests arrive.
pub fn create_default_state<S: EventStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> Result<Arc<AppState>, DispatchError> {
    let shared_store: Arc<dyn EventStore> = Arc::new(store.clone());

    let mut events = EventBus::new();
    let users = Arc::new(UserView::new(Arc::clone(&shared_store)));
    register_user_projections(&mut events, Arc::clone(&users));
    let events = Arc::new(events);

    let repository = Arc::new(Repository::<User, S>::new(store, events));
    let mut commands = CommandBus::new();
    register_user_handlers(&mut commands, repository)?;

    Ok(Arc::new(AppState {
        commands: Arc::new(commands),
        users,
        store: shared_store,
        command_timeout: config.command_timeout,
    }))
}
