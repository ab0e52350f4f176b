use axum::{
    extract::State,
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{ActivateRequest, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse},
        password::{self, Password},
        tokens::{self, Scope, TokenError, TOKEN_LEN},
    },
    error::{AppError, ValidationErrors},
    extract::JsonBody,
    state::AppState,
    users::model::{self, normalize_email, NewUser, User},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/activated", put(activate))
        .route("/users/login", post(login))
}

fn invalid_activation_token() -> AppError {
    AppError::Validation(ValidationErrors::single(
        "token",
        "invalid or expired activation token",
    ))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let mut password = Password::default();
    password.set(&payload.password)?;

    let mut user = NewUser {
        name: payload.name.trim().to_owned(),
        surname: payload.surname.trim().to_owned(),
        username: payload.username.trim().to_owned(),
        email: normalize_email(&payload.email),
        password,
        activated: false,
    };

    let mut v = ValidationErrors::new();
    model::validate_new_user(&mut v, &user);
    if !v.is_empty() {
        warn!(email = %user.email, "registration rejected");
        return Err(AppError::Validation(v));
    }
    user.password.forget_plaintext();

    let user = state.users.insert(&user).await?;
    let activation_token = tokens::issue(
        state.tokens.as_ref(),
        user.id,
        state.config.tokens.activation_ttl(),
        Scope::Activation,
    )
    .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user,
            activation_token,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn activate(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ActivateRequest>,
) -> Result<Json<User>, AppError> {
    let mut v = ValidationErrors::new();
    v.check(!payload.token.is_empty(), "token", "must be provided");
    v.check(
        payload.token.len() == TOKEN_LEN,
        "token",
        "must be 26 bytes long",
    );
    v.into_result()?;

    let user_id = match tokens::verify(state.tokens.as_ref(), &payload.token, Scope::Activation).await {
        Ok(id) => id,
        Err(TokenError::Store(e)) => return Err(e.into()),
        Err(e) => {
            warn!(error = %e, "activation token rejected");
            return Err(invalid_activation_token());
        }
    };

    let mut user = state.users.get(user_id).await?.ok_or_else(|| {
        warn!(%user_id, "activation token belongs to a missing user");
        invalid_activation_token()
    })?;
    user.activated = true;
    let user = state.users.update(&user).await?;

    tokens::revoke_all(state.tokens.as_ref(), user.id, Scope::Activation).await?;

    info!(user_id = %user.id, "user activated");
    Ok(Json(user))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), AppError> {
    let email = normalize_email(&payload.email);

    let mut v = ValidationErrors::new();
    model::validate_email(&mut v, &email);
    password::validate_plaintext(&mut v, &payload.password);
    v.into_result()?;

    let user = state.users.get_by_email(&email).await?.ok_or_else(|| {
        warn!(%email, "login unknown email");
        AppError::InvalidCredentials
    })?;

    if !user.password.matches(&payload.password)? {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let authentication_token = tokens::issue(
        state.tokens.as_ref(),
        user.id,
        state.config.tokens.authentication_ttl(),
        Scope::Authentication,
    )
    .await?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            authentication_token,
        }),
    ))
}
