//! Driven port for password digests.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    pub enum PasswordHashError {
        /// Hashing failed.
        Hash { message: String } => "password hashing failed: {message}",
        /// The stored digest could not be parsed.
        MalformedDigest { message: String } => "stored password digest is malformed: {message}",
    }
}

/// One-way password hashing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// Produce a self-describing digest of `plaintext`.
    async fn hash(&self, plaintext: &str) -> Result<String, PasswordHashError>;

    /// Check `plaintext` against a digest produced by [`PasswordHasher::hash`].
    async fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, PasswordHashError>;
}
