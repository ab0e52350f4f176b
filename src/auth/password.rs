use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::error;

use crate::error::ValidationErrors;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hashing(password_hash::Error),
    #[error("stored password hash is unusable: {0}")]
    Verification(password_hash::Error),
}

/// A user's credential: the argon2 hash that gets persisted, plus the plaintext
/// only while the value that set it is still being validated.
#[derive(Debug, Default)]
pub struct Password {
    plaintext: Option<SecretString>,
    hash: Option<String>,
}

impl Clone for Password {
    fn clone(&self) -> Self {
        Self {
            plaintext: self
                .plaintext
                .as_ref()
                .map(|p| SecretString::from(p.expose_secret().to_owned())),
            hash: self.hash.clone(),
        }
    }
}

impl Password {
    /// Wraps a hash loaded from the store. No plaintext is attached.
    pub fn from_hash(hash: String) -> Self {
        Self {
            plaintext: None,
            hash: Some(hash),
        }
    }

    pub fn set(&mut self, plain: &str) -> Result<(), PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                PasswordError::Hashing(e)
            })?
            .to_string();
        self.plaintext = Some(SecretString::from(plain.to_owned()));
        self.hash = Some(hash);
        Ok(())
    }

    /// `Ok(false)` on mismatch; an error only when the stored hash cannot be parsed or used.
    pub fn matches(&self, plain: &str) -> Result<bool, PasswordError> {
        let Some(hash) = self.hash.as_deref() else {
            return Ok(false);
        };
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            PasswordError::Verification(e)
        })?;
        match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::Verification(e)),
        }
    }

    pub fn plaintext(&self) -> Option<&str> {
        self.plaintext.as_ref().map(|p| p.expose_secret())
    }

    /// Drops the transient plaintext once validation is over.
    pub fn forget_plaintext(&mut self) {
        self.plaintext = None;
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    /// The hash to write to the store.
    ///
    /// # Panics
    ///
    /// When no hash was ever set. Persisting such a user is a programming error.
    pub fn persisted_hash(&self) -> &str {
        match self.hash.as_deref() {
            Some(h) if !h.is_empty() => h,
            _ => panic!("missing password hash for user"),
        }
    }
}

pub fn validate_plaintext(v: &mut ValidationErrors, plain: &str) {
    v.check(!plain.is_empty(), "password", "must be provided");
    v.check(plain.len() >= 8, "password", "must be at least 8 bytes long");
    v.check(plain.len() <= 72, "password", "must not be more than 72 bytes long");
}
