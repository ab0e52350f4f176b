use std::time::Duration;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::tokens::{Scope, TokenRecord, TokenStore};
use crate::db::{timed, StoreError};

#[derive(Clone)]
pub struct PgTokenStore {
    db: PgPool,
    timeout: Duration,
}

impl PgTokenStore {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

/// Row shape of the `tokens` table.
#[derive(Debug, FromRow)]
struct TokenRow {
    hash: Vec<u8>,
    user_id: Uuid,
    expiry: OffsetDateTime,
    scope: String,
}

impl TryFrom<TokenRow> for TokenRecord {
    type Error = StoreError;

    fn try_from(r: TokenRow) -> Result<Self, Self::Error> {
        let scope = Scope::parse(&r.scope).ok_or_else(|| {
            StoreError::Database(sqlx::Error::Decode(
                format!("unknown token scope {:?}", r.scope).into(),
            ))
        })?;
        Ok(Self {
            hash: r.hash,
            user_id: r.user_id,
            expiry: r.expiry,
            scope,
        })
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn insert(&self, record: &TokenRecord) -> Result<(), StoreError> {
        timed(
            self.timeout,
            sqlx::query(
                r#"
                INSERT INTO tokens (hash, user_id, expiry, scope)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(&record.hash)
            .bind(record.user_id)
            .bind(record.expiry)
            .bind(record.scope.as_str())
            .execute(&self.db),
        )
        .await?;
        Ok(())
    }

    async fn get_by_hash(&self, hash: &[u8]) -> Result<Option<TokenRecord>, StoreError> {
        let row = timed(
            self.timeout,
            sqlx::query_as::<_, TokenRow>(
                r#"
                SELECT hash, user_id, expiry, scope
                FROM tokens
                WHERE hash = $1
                "#,
            )
            .bind(hash)
            .fetch_optional(&self.db),
        )
        .await?;
        row.map(TokenRecord::try_from).transpose()
    }

    async fn delete_all_for_user(&self, scope: Scope, user_id: Uuid) -> Result<u64, StoreError> {
        let res = timed(
            self.timeout,
            sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
                .bind(scope.as_str())
                .bind(user_id)
                .execute(&self.db),
        )
        .await?;
        Ok(res.rows_affected())
    }
}
