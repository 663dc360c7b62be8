//! User query endpoints served from the users read model.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::AggregateId;
use projections::{UserPage, UserRow};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub email: Option<String>,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

/// GET /users/{id}
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UserRow>, ApiError> {
    let id: AggregateId = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid user id: {id}")))?;

    state
        .users
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("User not found: {id}")))
}

/// GET /users?page=&limit=&email=
///
/// With `email` set, the page holds the matching user or nothing.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListUsersQuery>,
) -> Json<UserPage> {
    if let Some(email) = query.email {
        let users: Vec<UserRow> = state.users.find_by_email(&email).await.into_iter().collect();
        let total = users.len();
        return Json(UserPage { users, total });
    }

    Json(state.users.list(query.page, query.limit).await)
}
