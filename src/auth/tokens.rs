//! Opaque bearer tokens.
//!
//! A token is 16 random bytes encoded as 26 characters of RFC 4648 base32
//! without padding. Only the SHA-256 of the plaintext is stored; the plaintext
//! goes back to the client once, at issue time.

use std::fmt;

use async_trait::async_trait;
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::StoreError;

pub const TOKEN_BYTES: usize = 16;
pub const TOKEN_LEN: usize = 26;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Activation,
    Authentication,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Activation => "activation",
            Scope::Authentication => "authentication",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "activation" => Some(Scope::Activation),
            "authentication" => Some(Scope::Authentication),
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the client receives. The owner and scope live only in the stored record.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry: OffsetDateTime,
}

/// Stored form of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub hash: Vec<u8>,
    pub user_id: Uuid,
    pub expiry: OffsetDateTime,
    pub scope: Scope,
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, record: &TokenRecord) -> Result<(), StoreError>;
    async fn get_by_hash(&self, hash: &[u8]) -> Result<Option<TokenRecord>, StoreError>;
    async fn delete_all_for_user(&self, scope: Scope, user_id: Uuid) -> Result<u64, StoreError>;
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token must be 26 base32 characters")]
    Malformed,
    #[error("token not found")]
    NotFound,
    #[error("token expired")]
    Expired,
    #[error("token scope mismatch")]
    ScopeMismatch,
    #[error("token generation failed: {0}")]
    Entropy(#[from] rand::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub async fn issue(
    store: &dyn TokenStore,
    user_id: Uuid,
    ttl: time::Duration,
    scope: Scope,
) -> Result<Token, TokenError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.try_fill_bytes(&mut bytes)?;
    let token = Token {
        plaintext: base32_encode(&bytes),
        expiry: OffsetDateTime::now_utc().saturating_add(ttl),
    };
    store
        .insert(&TokenRecord {
            hash: hash_token(&token.plaintext),
            user_id,
            expiry: token.expiry,
            scope,
        })
        .await?;
    debug!(%user_id, %scope, "token issued");
    Ok(token)
}

/// Resolves a presented token to its user id.
///
/// Badly shaped input is rejected before the store is consulted.
pub async fn verify(
    store: &dyn TokenStore,
    plaintext: &str,
    scope: Scope,
) -> Result<Uuid, TokenError> {
    if !is_well_formed(plaintext) {
        return Err(TokenError::Malformed);
    }
    let record = store
        .get_by_hash(&hash_token(plaintext))
        .await?
        .ok_or(TokenError::NotFound)?;
    if OffsetDateTime::now_utc() >= record.expiry {
        warn!(user_id = %record.user_id, %scope, "expired token presented");
        return Err(TokenError::Expired);
    }
    if record.scope != scope {
        warn!(user_id = %record.user_id, expected = %scope, actual = %record.scope, "token scope mismatch");
        return Err(TokenError::ScopeMismatch);
    }
    Ok(record.user_id)
}

pub async fn revoke_all(
    store: &dyn TokenStore,
    user_id: Uuid,
    scope: Scope,
) -> Result<u64, TokenError> {
    let n = store.delete_all_for_user(scope, user_id).await?;
    debug!(%user_id, %scope, revoked = n, "tokens revoked");
    Ok(n)
}

pub fn is_well_formed(plaintext: &str) -> bool {
    plaintext.len() == TOKEN_LEN && plaintext.bytes().all(|b| BASE32_ALPHABET.contains(&b))
}

pub fn hash_token(plaintext: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hasher.finalize().to_vec()
}

fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8).div_ceil(5));
    let mut bits = 0u32;
    let mut bit_count = 0u8;

    for &byte in data {
        bits = (bits << 8) | u32::from(byte);
        bit_count += 8;
        while bit_count >= 5 {
            bit_count -= 5;
            out.push(BASE32_ALPHABET[((bits >> bit_count) & 0x1F) as usize] as char);
        }
    }
    if bit_count > 0 {
        out.push(BASE32_ALPHABET[((bits << (5 - bit_count)) & 0x1F) as usize] as char);
    }
    out
}
