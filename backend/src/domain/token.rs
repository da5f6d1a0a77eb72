//! Single-use invitation tokens.
//!
//! Plaintext tokens leave the process only inside activation links; storage
//! sees the SHA-256 digest. Digest comparison is constant time.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Bytes of entropy in a freshly issued token.
pub const TOKEN_ENTROPY_BYTES: usize = 16;

/// Default lifetime of an invitation.
pub const DEFAULT_INVITATION_TTL: Duration = Duration::from_secs(72 * 60 * 60);

const DIGEST_LEN: usize = 32;

/// Secret token handed to the account owner.
///
/// The buffer is wiped on drop and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct PlaintextToken(Zeroizing<String>);

impl PlaintextToken {
    /// Wrap a token received from a client.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(Zeroizing::new(raw.into()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for PlaintextToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PlaintextToken(<redacted>)")
    }
}

/// SHA-256 digest of a [`PlaintextToken`].
#[derive(Clone, Copy)]
pub struct TokenDigest([u8; DIGEST_LEN]);

/// Raised when stored digest bytes have the wrong length.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("token digest must be {DIGEST_LEN} bytes, got {actual}")]
pub struct TokenDigestLengthError {
    actual: usize,
}

impl TokenDigest {
    /// Digest a plaintext token.
    #[must_use]
    pub fn of(token: &PlaintextToken) -> Self {
        Self(Sha256::digest(token.as_str().as_bytes()).into())
    }

    /// Rebuild a digest from stored bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TokenDigestLengthError> {
        <[u8; DIGEST_LEN]>::try_from(bytes)
            .map(Self)
            .map_err(|_| TokenDigestLengthError {
                actual: bytes.len(),
            })
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex rendering, as embedded in digest-mode activation links.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hex digest; `None` for anything else.
    #[must_use]
    pub fn from_hex(text: &str) -> Option<Self> {
        if text.len() != DIGEST_LEN * 2 {
            return None;
        }
        hex::decode(text)
            .ok()
            .and_then(|bytes| Self::from_slice(&bytes).ok())
    }
}

impl PartialEq for TokenDigest {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for TokenDigest {}

impl Hash for TokenDigest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Debug for TokenDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenDigest({})", self.to_hex())
    }
}

/// A newly minted invitation.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub plaintext: PlaintextToken,
    pub digest: TokenDigest,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of checking a presented token against a stored invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenValidity {
    Valid,
    Expired,
    Mismatch,
}

/// Issues and validates invitation tokens against an injected clock.
#[derive(Clone)]
pub struct InvitationTokens {
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
}

impl InvitationTokens {
    /// Build a token service whose invitations live for `ttl`.
    ///
    /// Durations beyond `chrono`'s range saturate to the maximum delta.
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            clock,
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Mint a token with 128 bits of OS entropy.
    #[must_use]
    pub fn issue(&self) -> IssuedToken {
        let mut entropy = Zeroizing::new([0_u8; TOKEN_ENTROPY_BYTES]);
        OsRng.fill_bytes(entropy.as_mut_slice());
        let plaintext = PlaintextToken::new(hex::encode(entropy.as_slice()));
        let digest = TokenDigest::of(&plaintext);
        let now = self.clock.utc();
        let expires_at = now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        IssuedToken {
            plaintext,
            digest,
            expires_at,
        }
    }

    /// Digest a presented token.
    #[must_use]
    pub fn digest(&self, plaintext: &PlaintextToken) -> TokenDigest {
        TokenDigest::of(plaintext)
    }

    /// Classify a presented digest against the stored digest and expiry.
    ///
    /// An invitation is expired strictly after `expires_at`.
    #[must_use]
    pub fn validate(
        &self,
        presented: &TokenDigest,
        stored: &TokenDigest,
        expires_at: DateTime<Utc>,
    ) -> TokenValidity {
        if presented != stored {
            return TokenValidity::Mismatch;
        }
        if self.clock.utc() > expires_at {
            TokenValidity::Expired
        } else {
            TokenValidity::Valid
        }
    }
}
