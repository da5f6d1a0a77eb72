//! Fast, reversible password "hasher" for tests.

use async_trait::async_trait;

use crate::domain::ports::{PasswordHashError, PasswordHasher};

const PREFIX: &str = "plain$";

/// Stores passwords behind a marker prefix. Never use outside tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainPasswordHasher;

#[async_trait]
impl PasswordHasher for PlainPasswordHasher {
    async fn hash(&self, plaintext: &str) -> Result<String, PasswordHashError> {
        Ok(format!("{PREFIX}{plaintext}"))
    }

    async fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, PasswordHashError> {
        digest
            .strip_prefix(PREFIX)
            .map(|stored| stored == plaintext)
            .ok_or_else(|| PasswordHashError::malformed_digest("missing plain$ prefix"))
    }
}
