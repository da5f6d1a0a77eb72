//! `DieselPostRepository` against embedded PostgreSQL.
//!
//! Exercises the row-locked read-modify-write path, the conditional
//! `UPDATE ... WHERE version = ?` used by optimistic writers, and the
//! existence check that separates a lost race from a missing row.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta};
use futures::future::join_all;
use rstest::{fixture, rstest};
use social_backend::domain::ports::{
    AccountRepository, NewInvitation, PostRepository, PostRepositoryError,
};
use social_backend::domain::{
    MutationRejected, NewAccount, PlaintextToken, Post, PostDraft, PostId, TokenDigest, UserId,
    Version,
};
use social_backend::outbound::persistence::{DieselAccountRepository, DieselPostRepository};

mod support;

use support::{TestDatabase, handle_cluster_setup_failure, test_database};

struct Context {
    db: TestDatabase,
    posts: Arc<DieselPostRepository>,
    owner: UserId,
}

impl Context {
    fn seed_post(&self) -> Post {
        self.db
            .runtime
            .block_on(self.posts.create(self.owner, &draft("Launch notes")))
            .expect("seed post")
    }

    fn stored(&self, id: PostId) -> Post {
        self.db
            .runtime
            .block_on(self.posts.find_by_id(id))
            .expect("find post")
            .expect("post exists")
    }
}

fn draft(title: &str) -> PostDraft {
    PostDraft {
        title: title.to_owned(),
        content: "Everything shipped on time.".to_owned(),
        tags: vec!["release".to_owned()],
    }
}

fn setup() -> Result<Context, String> {
    let db = test_database(8)?;
    let accounts = DieselAccountRepository::new(db.pool.clone());
    let owner = db
        .runtime
        .block_on(accounts.create_with_invitation(
            &NewAccount {
                username: "author".to_owned(),
                email: "author@x.com".to_owned(),
                password_digest: "plain$pw".to_owned(),
            },
            &NewInvitation {
                digest: TokenDigest::of(&PlaintextToken::new("author-token")),
                expires_at: DateTime::UNIX_EPOCH + TimeDelta::days(365 * 40),
            },
        ))
        .map_err(|err| err.to_string())?
        .id();
    Ok(Context {
        posts: Arc::new(DieselPostRepository::new(db.pool.clone())),
        db,
        owner,
    })
}

#[fixture]
fn context() -> Option<Context> {
    match setup() {
        Ok(ctx) => Some(ctx),
        Err(reason) => handle_cluster_setup_failure(reason),
    }
}

#[rstest]
fn created_post_starts_at_initial_version(context: Option<Context>) {
    let Some(ctx) = context else {
        eprintln!("SKIP-TEST-CLUSTER: created_post_starts_at_initial_version skipped");
        return;
    };

    let post = ctx.seed_post();

    assert_eq!(post.version(), Version::INITIAL);
    assert_eq!(post.owner(), ctx.owner);
    assert_eq!(ctx.stored(post.id()), post);
}

#[rstest]
fn concurrent_locked_updates_serialise_on_the_row(context: Option<Context>) {
    let Some(ctx) = context else {
        eprintln!("SKIP-TEST-CLUSTER: concurrent_locked_updates_serialise_on_the_row skipped");
        return;
    };
    let id = ctx.seed_post().id();

    let writers = (0..8).map(|n| {
        let posts = Arc::clone(&ctx.posts);
        ctx.db.runtime.spawn(async move {
            let mutate = move |post: &mut Post| -> Result<(), MutationRejected> {
                post.set_title(format!("Edit {n}"));
                Ok(())
            };
            posts.update_locked(id, &mutate).await
        })
    });
    let results = ctx.db.runtime.block_on(join_all(writers));

    let mut versions: Vec<Version> = results
        .into_iter()
        .map(|result| result.expect("task").expect("locked update commits").version())
        .collect();
    versions.sort();
    let expected: Vec<Version> = (2..=9).map(Version::new).collect();
    assert_eq!(versions, expected);
    assert_eq!(ctx.stored(id).version(), Version::new(9));
}

#[rstest]
fn rejected_mutation_rolls_back(context: Option<Context>) {
    let Some(ctx) = context else {
        eprintln!("SKIP-TEST-CLUSTER: rejected_mutation_rolls_back skipped");
        return;
    };
    let post = ctx.seed_post();
    let mutate = |post: &mut Post| -> Result<(), MutationRejected> {
        post.set_title("Never stored");
        Err(MutationRejected::new("title frozen"))
    };

    let err = ctx
        .db
        .runtime
        .block_on(ctx.posts.update_locked(post.id(), &mutate))
        .expect_err("rejected");

    assert!(matches!(err, PostRepositoryError::Rejected { .. }), "got {err:?}");
    let stored = ctx.stored(post.id());
    assert_eq!(stored.version(), Version::INITIAL);
    assert_eq!(stored.title(), "Launch notes");
}

#[rstest]
fn locked_update_of_missing_post_is_not_found(context: Option<Context>) {
    let Some(ctx) = context else {
        eprintln!("SKIP-TEST-CLUSTER: locked_update_of_missing_post_is_not_found skipped");
        return;
    };
    let mutate = |_: &mut Post| -> Result<(), MutationRejected> { Ok(()) };

    let err = ctx
        .db
        .runtime
        .block_on(ctx.posts.update_locked(PostId::new(404), &mutate))
        .expect_err("missing");

    assert!(matches!(err, PostRepositoryError::NotFound { .. }), "got {err:?}");
}

#[rstest]
fn stale_compare_and_swap_is_a_conflict(context: Option<Context>) {
    let Some(ctx) = context else {
        eprintln!("SKIP-TEST-CLUSTER: stale_compare_and_swap_is_a_conflict skipped");
        return;
    };
    let id = ctx.seed_post().id();

    let first = ctx
        .db
        .runtime
        .block_on(ctx.posts.compare_and_swap(id, Version::INITIAL, &draft("First edit")))
        .expect("first writer wins");
    let err = ctx
        .db
        .runtime
        .block_on(ctx.posts.compare_and_swap(id, Version::INITIAL, &draft("Late edit")))
        .expect_err("second writer is stale");

    assert_eq!(first.version(), Version::new(2));
    assert!(
        matches!(err, PostRepositoryError::VersionConflict { .. }),
        "got {err:?}"
    );
    let stored = ctx.stored(id);
    assert_eq!(stored.version(), Version::new(2));
    assert_eq!(stored.title(), "First edit");
}

#[rstest]
fn compare_and_swap_on_missing_post_is_not_found(context: Option<Context>) {
    let Some(ctx) = context else {
        eprintln!("SKIP-TEST-CLUSTER: compare_and_swap_on_missing_post_is_not_found skipped");
        return;
    };

    let err = ctx
        .db
        .runtime
        .block_on(ctx.posts.compare_and_swap(
            PostId::new(404),
            Version::INITIAL,
            &draft("Ghost"),
        ))
        .expect_err("missing");

    assert!(matches!(err, PostRepositoryError::NotFound { .. }), "got {err:?}");
}

#[rstest]
fn delete_reports_whether_a_row_was_removed(context: Option<Context>) {
    let Some(ctx) = context else {
        eprintln!("SKIP-TEST-CLUSTER: delete_reports_whether_a_row_was_removed skipped");
        return;
    };
    let id = ctx.seed_post().id();

    let first = ctx.db.runtime.block_on(ctx.posts.delete(id)).expect("delete");
    let second = ctx.db.runtime.block_on(ctx.posts.delete(id)).expect("delete");

    assert!(first);
    assert!(!second);
    assert_eq!(ctx.db.count_rows("posts"), 0);
}
