//! Versioned post aggregate.
//!
//! Only title, content, and tags are mutable. Identity, ownership, and the
//! version counter are fixed for the lifetime of one read so a mutation
//! callback cannot forge them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::UserId;

/// Database-assigned post identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct PostId(i64);

impl PostId {
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for PostId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Optimistic concurrency counter.
///
/// Starts at [`Version::INITIAL`] and increases by exactly one per committed
/// update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct Version(i32);

impl Version {
    /// Version assigned on insert.
    pub const INITIAL: Self = Self(1);

    #[must_use]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }

    /// The version a successful update of `self` produces.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A post as read from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    id: PostId,
    #[serde(rename = "userId")]
    owner: UserId,
    title: String,
    content: String,
    tags: Vec<String>,
    version: Version,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Post {
    /// Assemble a snapshot read from storage.
    #[must_use]
    pub fn new(
        id: PostId,
        owner: UserId,
        draft: PostDraft,
        version: Version,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner,
            title: draft.title,
            content: draft.content,
            tags: draft.tags,
            version,
            created_at,
            updated_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> PostId {
        self.id
    }

    #[must_use]
    pub fn owner(&self) -> UserId {
        self.owner
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    pub fn set_tags(&mut self, tags: Vec<String>) {
        self.tags = tags;
    }

    /// The mutable fields as they would be written back.
    #[must_use]
    pub fn draft(&self) -> PostDraft {
        PostDraft {
            title: self.title.clone(),
            content: self.content.clone(),
            tags: self.tags.clone(),
        }
    }

    /// Snapshot after a committed update.
    #[must_use]
    pub fn committed(mut self, version: Version, updated_at: DateTime<Utc>) -> Self {
        self.version = version;
        self.updated_at = updated_at;
        self
    }
}

/// The mutable fields of a post.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

/// Why a mutation callback refused a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// The requested change is not acceptable for this post.
    Invalid,
    /// The caller's expected version does not match the locked row.
    Stale,
    /// The caller does not own the post.
    NotOwner,
}

/// Reason a mutation callback refused to change a post.
///
/// Rejections abort the update without consuming a retry attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct MutationRejected {
    kind: RejectionKind,
    reason: String,
}

impl MutationRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            kind: RejectionKind::Invalid,
            reason: reason.into(),
        }
    }

    /// Reject because the caller's expected version is stale.
    #[must_use]
    pub fn stale(expected: Version, actual: Version) -> Self {
        Self {
            kind: RejectionKind::Stale,
            reason: format!("expected version {expected} but post is at version {actual}"),
        }
    }

    /// Reject because `actor` does not own the post.
    #[must_use]
    pub fn not_owner(actor: UserId) -> Self {
        Self {
            kind: RejectionKind::NotOwner,
            reason: format!("user {actor} does not own this post"),
        }
    }

    #[must_use]
    pub fn kind(&self) -> RejectionKind {
        self.kind
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}
