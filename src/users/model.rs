use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::password::{self, Password},
    error::ValidationErrors,
    filters::{field, SortField},
};

pub const SORT_FIELDS: &[SortField] = &[
    field("id", "id"),
    field("createdAt", "created_at"),
    field("name", "name"),
    field("surname", "surname"),
    field("username", "username"),
    field("email", "email"),
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub name: String,
    pub surname: String,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password: Password,
    pub activated: bool,
    #[serde(skip)]
    pub version: i32,
}

/// A user that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub surname: String,
    pub username: String,
    pub email: String,
    pub password: Password,
    pub activated: bool,
}

/// Row shape of the `users` table.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub name: String,
    pub surname: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub activated: bool,
    pub version: i32,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            created_at: r.created_at,
            updated_at: r.updated_at,
            name: r.name,
            surname: r.surname,
            username: r.username,
            email: r.email,
            password: Password::from_hash(r.password_hash),
            activated: r.activated,
            version: r.version,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn validate_email(v: &mut ValidationErrors, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(is_valid_email(email), "email", "must be a valid email address");
}

fn validate_profile(v: &mut ValidationErrors, name: &str, surname: &str, username: &str, email: &str) {
    v.check(!name.is_empty(), "name", "must be provided");
    v.check(name.len() <= 500, "name", "must not be more than 500 bytes long");
    v.check(surname.len() <= 500, "surname", "must not be more than 500 bytes long");
    v.check(!username.is_empty(), "username", "must be provided");
    v.check(username.len() <= 100, "username", "must not be more than 100 bytes long");
    validate_email(v, email);
}

/// Validates a user about to be written.
///
/// # Panics
///
/// When the credential carries no hash.
fn validate_credential(v: &mut ValidationErrors, password: &Password) {
    if let Some(plain) = password.plaintext() {
        password::validate_plaintext(v, plain);
    }
    password.persisted_hash();
}

pub fn validate_new_user(v: &mut ValidationErrors, user: &NewUser) {
    validate_profile(v, &user.name, &user.surname, &user.username, &user.email);
    validate_credential(v, &user.password);
}

pub fn validate_user(v: &mut ValidationErrors, user: &User) {
    validate_profile(v, &user.name, &user.surname, &user.username, &user.email);
    validate_credential(v, &user.password);
}
