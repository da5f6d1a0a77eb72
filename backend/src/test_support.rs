//! Test doubles shared by unit tests (in `src/`) and integration tests (in
//! `tests/`).
//!
//! Compiled for `cfg(test)` and behind the `test-support` feature.

mod accounts;
mod clock;
mod mail;
mod passwords;
mod posts;

pub use accounts::InMemoryAccountRepository;
pub use clock::MutableClock;
pub use mail::{FailingMailSender, RecordingMailSender};
pub use passwords::PlainPasswordHasher;
pub use posts::InMemoryPostRepository;
