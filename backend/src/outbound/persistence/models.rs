//! Row types mapping between Diesel and the domain.
//!
//! Internal to the persistence layer.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::schema::{posts, user_invitations, users};
use crate::domain::{Post, PostDraft, PostId, User, UserId, Version};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_digest: String,
    pub activated: bool,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self::new(
            UserId::new(row.id),
            row.username,
            row.email,
            row.activated,
            row.created_at,
        )
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub(crate) struct NewUserRow<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_digest: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = posts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PostRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub user_id: i64,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Self::new(
            PostId::new(row.id),
            UserId::new(row.user_id),
            PostDraft {
                title: row.title,
                content: row.content,
                tags: row.tags,
            },
            Version::new(row.version),
            row.created_at,
            row.updated_at,
        )
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = posts)]
pub(crate) struct NewPostRow<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub tags: &'a [String],
    pub user_id: i64,
}

/// Mutable columns written by a conditional update.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = posts)]
pub(crate) struct PostContentChangeset<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub tags: &'a [String],
}

impl<'a> From<&'a PostDraft> for PostContentChangeset<'a> {
    fn from(draft: &'a PostDraft) -> Self {
        Self {
            title: &draft.title,
            content: &draft.content,
            tags: &draft.tags,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = user_invitations)]
pub(crate) struct NewInvitationRow<'a> {
    pub token_digest: &'a [u8],
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = user_invitations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct InvitationRow {
    pub token_digest: Vec<u8>,
    pub expiry: DateTime<Utc>,
}
