use std::{future::Future, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::warn;

use crate::config::AppConfig;

/// Failures reported by the store traits.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store call timed out")]
    Timeout,
    #[error("edit conflict")]
    EditConflict,
    #[error("duplicate value for {0}")]
    Duplicate(&'static str),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.store_timeout())
        .connect(&config.database_url)
        .await
        .context("connect to database")
}

/// Runs a store call under `limit`; an elapsed deadline becomes `StoreError::Timeout`.
pub async fn timed<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res.map_err(|e| match e {
            sqlx::Error::PoolTimedOut => StoreError::Timeout,
            other => StoreError::Database(other),
        }),
        Err(_) => {
            warn!(timeout_ms = limit.as_millis() as u64, "store call timed out");
            Err(StoreError::Timeout)
        }
    }
}

/// Maps a unique-constraint violation on one of `constraints` to `StoreError::Duplicate`.
pub fn unique_violation(err: StoreError, constraints: &[(&str, &'static str)]) -> StoreError {
    if let StoreError::Database(sqlx::Error::Database(db_err)) = &err {
        if db_err.code().is_some_and(|code| code.as_ref() == "23505") {
            if let Some((_, field)) = constraints
                .iter()
                .find(|(name, _)| db_err.constraint() == Some(*name))
            {
                return StoreError::Duplicate(*field);
            }
        }
    }
    err
}
