use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::model::{NewUser, User, UserRow};
use crate::{
    db::{timed, unique_violation, StoreError},
    filters::Filters,
};

const UNIQUE_FIELDS: &[(&str, &'static str)] =
    &[("users_email_key", "email"), ("users_username_key", "username")];

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: &NewUser) -> Result<User, StoreError>;
    async fn get(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Writes `user` if its `version` still matches the stored one, returning the new state.
    async fn update(&self, user: &User) -> Result<User, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn list(&self, filters: &Filters) -> Result<(Vec<User>, i64), StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
    timeout: Duration,
}

impl PgUserStore {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[derive(sqlx::FromRow)]
struct UserListRow {
    total: i64,
    #[sqlx(flatten)]
    user: UserRow,
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: &NewUser) -> Result<User, StoreError> {
        let row = timed(
            self.timeout,
            sqlx::query_as::<_, UserRow>(
                r#"
                INSERT INTO users (name, surname, username, email, password_hash, activated)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, created_at, updated_at, name, surname, username, email,
                          password_hash, activated, version
                "#,
            )
            .bind(&user.name)
            .bind(&user.surname)
            .bind(&user.username)
            .bind(&user.email)
            .bind(user.password.persisted_hash())
            .bind(user.activated)
            .fetch_one(&self.db),
        )
        .await
        .map_err(|e| unique_violation(e, UNIQUE_FIELDS))?;
        Ok(row.into())
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = timed(
            self.timeout,
            sqlx::query_as::<_, UserRow>(
                r#"
                SELECT id, created_at, updated_at, name, surname, username, email,
                       password_hash, activated, version
                FROM users
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&self.db),
        )
        .await?;
        Ok(row.map(Into::into))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = timed(
            self.timeout,
            sqlx::query_as::<_, UserRow>(
                r#"
                SELECT id, created_at, updated_at, name, surname, username, email,
                       password_hash, activated, version
                FROM users
                WHERE email = $1
                "#,
            )
            .bind(email)
            .fetch_optional(&self.db),
        )
        .await?;
        Ok(row.map(Into::into))
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let row = timed(
            self.timeout,
            sqlx::query_as::<_, UserRow>(
                r#"
                UPDATE users
                SET name = $1, surname = $2, username = $3, email = $4, password_hash = $5,
                    activated = $6, version = version + 1, updated_at = now()
                WHERE id = $7 AND version = $8
                RETURNING id, created_at, updated_at, name, surname, username, email,
                          password_hash, activated, version
                "#,
            )
            .bind(&user.name)
            .bind(&user.surname)
            .bind(&user.username)
            .bind(&user.email)
            .bind(user.password.persisted_hash())
            .bind(user.activated)
            .bind(user.id)
            .bind(user.version)
            .fetch_optional(&self.db),
        )
        .await
        .map_err(|e| unique_violation(e, UNIQUE_FIELDS))?;
        row.map(Into::into).ok_or(StoreError::EditConflict)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let res = timed(
            self.timeout,
            sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(id)
                .execute(&self.db),
        )
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list(&self, filters: &Filters) -> Result<(Vec<User>, i64), StoreError> {
        let sql = format!(
            r#"
            SELECT count(*) OVER() AS total, id, created_at, updated_at, name, surname,
                   username, email, password_hash, activated, version
            FROM users
            {}
            LIMIT $1 OFFSET $2
            "#,
            filters.order_by()
        );
        let rows = timed(
            self.timeout,
            sqlx::query_as::<_, UserListRow>(&sql)
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.db),
        )
        .await?;
        let total = match rows.first() {
            Some(r) => r.total,
            None if filters.offset() > 0 => {
                timed(
                    self.timeout,
                    sqlx::query_scalar::<_, i64>("SELECT count(*) FROM users").fetch_one(&self.db),
                )
                .await?
            }
            None => 0,
        };
        Ok((rows.into_iter().map(|r| r.user.into()).collect(), total))
    }
}
