//! In-memory post repository with a simulated row lock.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Barrier;

use crate::domain::ports::{PostMutation, PostRepository, PostRepositoryError};
use crate::domain::{Post, PostDraft, PostId, UserId, Version};

#[derive(Default)]
struct State {
    posts: BTreeMap<PostId, Post>,
    next_id: i64,
}

/// Post storage double.
///
/// `update_locked` serialises on an async mutex, mirroring a row lock.
/// Conflicts can be injected: each one commits a phantom concurrent write
/// (version bump) just before the caller's conditional write.
#[derive(Default)]
pub struct InMemoryPostRepository {
    state: Mutex<State>,
    row_lock: tokio::sync::Mutex<()>,
    pending_conflicts: AtomicU32,
    writes: AtomicUsize,
    next_failure: Mutex<Option<PostRepositoryError>>,
    read_gate: Mutex<Option<(usize, Arc<Barrier>)>>,
}

impl InMemoryPostRepository {
    /// Make the next `count` conditional writes lose to a concurrent writer.
    pub fn inject_conflicts(&self, count: u32) {
        self.pending_conflicts.store(count, Ordering::SeqCst);
    }

    /// Fail the next repository call with `error`.
    pub fn fail_next_with(&self, error: PostRepositoryError) {
        *lock(&self.next_failure) = Some(error);
    }

    /// Hold the next `reads` unlocked reads at `barrier` after they load.
    pub fn gate_reads(&self, reads: usize, barrier: Arc<Barrier>) {
        *lock(&self.read_gate) = (reads > 0).then_some((reads, barrier));
    }

    /// Number of committed updates.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current stored copy of a post.
    pub fn snapshot(&self, id: PostId) -> Option<Post> {
        lock(&self.state).posts.get(&id).cloned()
    }

    fn take_failure(&self) -> Result<(), PostRepositoryError> {
        lock(&self.next_failure).take().map_or(Ok(()), Err)
    }

    fn take_conflict(&self) -> bool {
        self.pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn gate(&self) -> Option<Arc<Barrier>> {
        let mut gate = lock(&self.read_gate);
        let (remaining, barrier) = gate.as_mut()?;
        *remaining -= 1;
        let barrier = Arc::clone(barrier);
        if *remaining == 0 {
            *gate = None;
        }
        Some(barrier)
    }

    fn write(
        &self,
        id: PostId,
        expected: Version,
        draft: &PostDraft,
    ) -> Result<Post, PostRepositoryError> {
        let mut state = lock(&self.state);
        let now = Utc::now();
        let Some(stored) = state.posts.get_mut(&id) else {
            return Err(PostRepositoryError::not_found(id.get()));
        };
        if self.take_conflict() {
            *stored = stored.clone().committed(stored.version().next(), now);
        }
        if stored.version() != expected {
            return Err(PostRepositoryError::version_conflict(id.get(), expected.get()));
        }
        let mut updated = stored.clone();
        updated.set_title(draft.title.clone());
        updated.set_content(draft.content.clone());
        updated.set_tags(draft.tags.clone());
        let updated = updated.committed(expected.next(), now);
        *stored = updated.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(updated)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn create(&self, owner: UserId, draft: &PostDraft) -> Result<Post, PostRepositoryError> {
        self.take_failure()?;
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = PostId::new(state.next_id);
        let now = Utc::now();
        let post = Post::new(id, owner, draft.clone(), Version::INITIAL, now, now);
        state.posts.insert(id, post.clone());
        Ok(post)
    }

    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, PostRepositoryError> {
        self.take_failure()?;
        let post = self.snapshot(id);
        if let Some(barrier) = self.gate() {
            barrier.wait().await;
        }
        Ok(post)
    }

    async fn delete(&self, id: PostId) -> Result<bool, PostRepositoryError> {
        self.take_failure()?;
        Ok(lock(&self.state).posts.remove(&id).is_some())
    }

    async fn update_locked(
        &self,
        id: PostId,
        mutate: PostMutation<'_>,
    ) -> Result<Post, PostRepositoryError> {
        self.take_failure()?;
        let _row = self.row_lock.lock().await;
        let mut post = self
            .snapshot(id)
            .ok_or_else(|| PostRepositoryError::not_found(id.get()))?;
        let read_version = post.version();
        mutate(&mut post).map_err(PostRepositoryError::rejected)?;
        self.write(id, read_version, &post.draft())
    }

    async fn compare_and_swap(
        &self,
        id: PostId,
        expected: Version,
        draft: &PostDraft,
    ) -> Result<Post, PostRepositoryError> {
        self.take_failure()?;
        self.write(id, expected, draft)
    }
}
