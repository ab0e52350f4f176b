use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::UpdateUserRequest,
    model::{self, normalize_email, User, SORT_FIELDS},
};
use crate::{
    auth::{
        guard::{ActivatedUser, AuthUser},
        tokens::{self, Scope},
    },
    error::{AppError, ValidationErrors},
    extract::{JsonBody, PathParam, QueryParams},
    filters::{build_filters, ListQuery, Page},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route(
            "/users/me",
            get(get_me).patch(update_me).delete(delete_me),
        )
        .route("/users/:id", get(get_user))
}

#[instrument(skip(state, _user))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<Page<User>>, AppError> {
    let filters = build_filters(&query, SORT_FIELDS, &state.config.paging)?;
    let (users, total) = state.users.list(&filters).await?;
    Ok(Json(Page::new(users, total, &filters)))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

#[instrument(skip(state, _user))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<User>, AppError> {
    let user = state.users.get(id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(user))
}

/// Applies a partial profile change. The write fails with 409 if the user
/// changed since it was loaded for this request.
#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    ActivatedUser(mut user): ActivatedUser,
    JsonBody(payload): JsonBody<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    if let Some(name) = payload.name {
        user.name = name.trim().to_owned();
    }
    if let Some(surname) = payload.surname {
        user.surname = surname.trim().to_owned();
    }
    if let Some(username) = payload.username {
        user.username = username.trim().to_owned();
    }
    if let Some(email) = payload.email {
        user.email = normalize_email(&email);
    }
    let password_changed = payload.password.is_some();
    if let Some(password) = payload.password {
        user.password.set(&password)?;
    }

    let mut v = ValidationErrors::new();
    model::validate_user(&mut v, &user);
    if !v.is_empty() {
        warn!("profile update rejected");
        return Err(AppError::Validation(v));
    }
    user.password.forget_plaintext();

    let user = state.users.update(&user).await?;
    if password_changed {
        // Sessions opened with the old password end here.
        tokens::revoke_all(state.tokens.as_ref(), user.id, Scope::Authentication).await?;
    }

    info!(password_changed, "user updated");
    Ok(Json(user))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<StatusCode, AppError> {
    if !state.users.delete(user.id).await? {
        return Err(AppError::NotFound);
    }
    info!("user deleted");
    Ok(StatusCode::NO_CONTENT)
}
