//! Session cookie key loading.

use std::path::{Path, PathBuf};

use actix_web::cookie::Key;
use cap_std::{ambient_authority, fs::Dir};
use tracing::warn;
use zeroize::Zeroizing;

/// Minimum key material accepted in release builds.
pub const SESSION_KEY_MIN_LEN: usize = 64;
/// Below this `Key::derive_from` cannot be used at all.
const DERIVE_MIN_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum SessionKeyError {
    #[error("failed to read session key at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session key at {path} too short: need >= {min_len} bytes, got {length}")]
    TooShort {
        path: PathBuf,
        length: usize,
        min_len: usize,
    },
}

fn read_key_file(path: &Path) -> std::io::Result<Zeroizing<Vec<u8>>> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "session key path must be a file")
    })?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
    dir.read(Path::new(file_name)).map(Zeroizing::new)
}

/// Derive the cookie key from `path`.
///
/// An unreadable file falls back to a random key when `allow_ephemeral` is
/// set or in debug builds; sessions then do not survive restarts. Short keys
/// are only tolerated in debug builds.
pub fn load_session_key(path: &Path, allow_ephemeral: bool) -> Result<Key, SessionKeyError> {
    load_with_mode(path, allow_ephemeral, cfg!(debug_assertions))
}

fn load_with_mode(path: &Path, allow_ephemeral: bool, debug: bool) -> Result<Key, SessionKeyError> {
    match read_key_file(path) {
        Ok(bytes) => {
            if !debug && bytes.len() < SESSION_KEY_MIN_LEN {
                return Err(SessionKeyError::TooShort {
                    path: path.to_path_buf(),
                    length: bytes.len(),
                    min_len: SESSION_KEY_MIN_LEN,
                });
            }
            if bytes.len() < DERIVE_MIN_LEN {
                warn!(path = %path.display(), length = bytes.len(), "session key too short; using temporary key");
                return Ok(Key::generate());
            }
            Ok(Key::derive_from(&bytes))
        }
        Err(source) if debug || allow_ephemeral => {
            warn!(path = %path.display(), error = %source, "using temporary session key");
            Ok(Key::generate())
        }
        Err(source) => Err(SessionKeyError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}
