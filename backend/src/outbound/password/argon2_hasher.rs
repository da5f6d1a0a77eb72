//! Argon2id `PasswordHasher` with PHC-format digests.
//!
//! Hashing is memory-hard and takes tens of milliseconds, so both operations
//! run on the blocking pool.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::domain::ports::{PasswordHashError, PasswordHasher};

/// Argon2id with the crate's default parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2PasswordHasher;

fn hash_blocking(plaintext: &str) -> Result<String, PasswordHashError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| PasswordHashError::hash(err.to_string()))
}

fn verify_blocking(plaintext: &str, digest: &str) -> Result<bool, PasswordHashError> {
    let parsed =
        PasswordHash::new(digest).map_err(|err| PasswordHashError::malformed_digest(err.to_string()))?;
    Ok(Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok())
}

fn join_error(err: tokio::task::JoinError) -> PasswordHashError {
    PasswordHashError::hash(format!("hashing task failed: {err}"))
}

#[async_trait]
impl PasswordHasher for Argon2PasswordHasher {
    async fn hash(&self, plaintext: &str) -> Result<String, PasswordHashError> {
        let plaintext = Zeroizing::new(plaintext.to_owned());
        tokio::task::spawn_blocking(move || hash_blocking(&plaintext))
            .await
            .map_err(join_error)?
    }

    async fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, PasswordHashError> {
        let plaintext = Zeroizing::new(plaintext.to_owned());
        let digest = digest.to_owned();
        tokio::task::spawn_blocking(move || verify_blocking(&plaintext, &digest))
            .await
            .map_err(join_error)?
    }
}
