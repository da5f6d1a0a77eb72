//! Diesel table definitions.
//!
//! Must match `backend/migrations` exactly; regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Registered accounts.
    users (id) {
        id -> Int8,
        /// Unique (`users_username_key`).
        username -> Varchar,
        /// Unique (`users_email_key`).
        email -> Varchar,
        /// PHC-format Argon2 digest.
        password_digest -> Text,
        /// Flips to true once, on invitation redemption.
        activated -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Versioned posts.
    posts (id) {
        id -> Int8,
        title -> Varchar,
        content -> Text,
        tags -> Array<Text>,
        /// Owning account.
        user_id -> Int8,
        /// Optimistic concurrency counter; starts at 1.
        version -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Outstanding single-use invitations.
    user_invitations (token_digest) {
        /// SHA-256 of the plaintext token.
        token_digest -> Bytea,
        user_id -> Int8,
        expiry -> Timestamptz,
    }
}

diesel::joinable!(posts -> users (user_id));
diesel::joinable!(user_invitations -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(posts, user_invitations, users);
