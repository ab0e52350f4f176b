use serde::{Deserialize, Serialize};

use super::tokens::Token;
use crate::users::model::User;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    #[serde(default)]
    pub surname: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Response to a registration: the user and the one-time activation token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user: User,
    pub activation_token: Token,
}

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub token: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub authentication_token: Token,
}
