use std::collections::BTreeMap;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{
    auth::{password::PasswordError, tokens::TokenError},
    db::StoreError,
};

/// Field name to message, reported back as a 400.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<&'static str, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `message` for `field` unless `ok`. The first message per field wins.
    pub fn check(&mut self, ok: bool, field: &'static str, message: impl Into<String>) {
        if !ok {
            self.add(field, message);
        }
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut v = Self::new();
        v.add(field, message);
        v
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed validation")]
    Validation(ValidationErrors),
    #[error("invalid sort field: {0}")]
    InvalidSort(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("malformed authorization header")]
    MalformedHeader,
    #[error("invalid or missing authentication token")]
    Unauthorized,
    #[error("invalid authentication credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("the requested resource could not be found")]
    NotFound,
    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,
    #[error("the store did not respond in time")]
    StoreTimeout,
    #[error("store error: {0}")]
    Store(#[source] sqlx::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidSort(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::MalformedHeader | Self::Unauthorized | Self::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::EditConflict => StatusCode::CONFLICT,
            Self::StoreTimeout | Self::Store(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Timeout => Self::StoreTimeout,
            StoreError::EditConflict => Self::EditConflict,
            StoreError::Duplicate(field) => Self::Validation(ValidationErrors::single(
                field,
                format!("a user with this {field} already exists"),
            )),
            StoreError::Database(e) => Self::Store(e),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(e: PasswordError) -> Self {
        Self::Internal(anyhow::Error::new(e))
    }
}

/// Any rejection of a presented token is a plain 401; store and RNG failures are not.
impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Store(e) => e.into(),
            e @ TokenError::Entropy(_) => Self::Internal(anyhow::Error::new(e)),
            TokenError::Malformed
            | TokenError::NotFound
            | TokenError::Expired
            | TokenError::ScopeMismatch => Self::Unauthorized,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::Validation(fields) => (status, Json(json!({ "error": fields }))).into_response(),
            Self::MalformedHeader | Self::Unauthorized => (
                status,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                Json(json!({ "error": self.to_string() })),
            )
                .into_response(),
            Self::StoreTimeout | Self::Store(_) | Self::Internal(_) => {
                error!(error = %self, "request failed");
                (
                    status,
                    Json(json!({
                        "error": "the server encountered a problem and could not process your request"
                    })),
                )
                    .into_response()
            }
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}
