//! Persisted scan cursor
//!
//! The cursor remembers where the previous invocation's query window ended so the
//! next one can continue from there. It lives in a small JSON file whose name is a
//! fingerprint of the invocation identity, so differently configured checks never
//! share a cursor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Environment variables that select the AWS credential context.
pub const CREDENTIAL_ENV_VARS: [&str; 3] = ["AWS_PROFILE", "AWS_ACCESS_KEY_ID", "AWS_REGION"];

/// How far the log scan has progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// End of the last attempted query window (unix seconds on disk)
    #[serde(with = "chrono::serde::ts_seconds")]
    pub last_window_end: DateTime<Utc>,
}

impl Cursor {
    pub fn new(last_window_end: DateTime<Utc>) -> Self {
        Self { last_window_end }
    }
}

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("failed to read cursor file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cursor file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write cursor file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Identity of one check configuration
///
/// Two invocations with the same identity share a cursor; any difference in
/// credential context or arguments yields a different cursor file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationIdentity {
    /// Values of [`CREDENTIAL_ENV_VARS`], empty when unset
    pub credential_context: Vec<String>,
    /// Command line arguments without the program name
    pub args: Vec<String>,
}

impl InvocationIdentity {
    /// Capture the identity of the running process
    ///
    /// Arguments and environment values that are not valid UTF-8 are converted
    /// lossily; the result only has to be stable per invocation.
    pub fn from_env<I>(args: I) -> Self
    where
        I: IntoIterator<Item = OsString>,
    {
        let credential_context = CREDENTIAL_ENV_VARS
            .iter()
            .map(|name| {
                std::env::var_os(name)
                    .map(|value| lossy(&value))
                    .unwrap_or_default()
            })
            .collect();
        Self {
            credential_context,
            args: args.into_iter().map(|arg| lossy(&arg)).collect(),
        }
    }

    /// Hex encoded SHA-256 over the credential context and argument vector
    pub fn fingerprint(&self) -> String {
        let mut joined = self.credential_context.clone();
        joined.push(self.args.join(" "));
        let digest = Sha256::digest(joined.join(" ").as_bytes());
        hex::encode(digest)
    }
}

fn lossy(value: &OsStr) -> String {
    value.to_string_lossy().into_owned()
}

/// Loads and saves the cursor file for one invocation identity
#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    /// Store whose file sits at exactly `path`
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store for `identity` under `state_dir`
    pub fn for_identity(state_dir: &Path, identity: &InvocationIdentity) -> Self {
        Self::new(state_dir.join(format!("{}.json", identity.fingerprint())))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cursor; a missing file is a cold start, not an error
    pub fn load(&self) -> Result<Option<Cursor>, CursorError> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cursor file at {}", self.path.display());
                return Ok(None);
            }
            Err(source) => {
                return Err(CursorError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let cursor: Cursor =
            serde_json::from_slice(&content).map_err(|source| CursorError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        debug!("Loaded cursor from {}: {:?}", self.path.display(), cursor);
        Ok(Some(cursor))
    }

    /// Atomically replace the cursor file
    ///
    /// The new content goes to a temporary file in the same directory which is
    /// synced and then renamed over the target, so readers see either the old or
    /// the new cursor and never a partial write.
    pub fn save(&self, cursor: &Cursor) -> Result<(), CursorError> {
        debug!("Saving cursor to {}: {:?}", self.path.display(), cursor);
        let write_err = |source| CursorError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(write_err)?;

        let json = serde_json::to_vec(cursor).map_err(|e| write_err(e.into()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(&json).map_err(write_err)?;
        tmp.write_all(b"\n").map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}
