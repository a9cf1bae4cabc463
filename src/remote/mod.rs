//! Remote file store sessions.
//!
//! A [`Connector`] opens one authenticated session per logical operation.
//! The session is wrapped in a [`SessionGuard`] which disconnects it when
//! dropped, so every exit path (success, business error, transport error or
//! panic unwinding) releases the connection before control returns.
//!
//! ## Backends
//!
//! - [`sftp`]: SSH/SFTP over `ssh2`
//! - [`memory`]: in-process store used by tests and dry runs
//!
//! ## Session states
//!
//! ```text
//!   connect ok                      disconnect
//! ──────────────▶ Connected ───────────────────────▶ Disconnected
//!   connect err                     disconnect
//! ──────────────▶ Faulted   ───────────────────────▶ Disconnected
//! ```

use std::fmt;
use std::io::Read;
use std::ops::{Deref, DerefMut};

use log::debug;

use crate::error::{Result, UploadError};
use crate::security::{join_remote, segments};

/// In-memory backend with fault injection and session accounting
pub mod memory;

/// SSH/SFTP backend
pub mod sftp;

pub use memory::{MemoryConnector, MemoryStore};
pub use sftp::{SftpConnector, SftpStore};

/// Lifecycle of a single remote session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Faulted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected => "connected",
            SessionState::Faulted => "faulted",
        };
        f.write_str(name)
    }
}

/// Outcome of an existence check. Transport failures are `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Directory,
    File,
    NotFound,
}

/// Outcome of a remove call. Transport failures are `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    NotFound,
}

/// Operations available on one open session.
pub trait RemoteFileStore: Send {
    fn state(&self) -> SessionState;

    /// Look up `path` (following symlinks).
    fn stat(&mut self, path: &str) -> Result<Presence>;

    /// Create a single directory whose parent already exists.
    fn create_dir(&mut self, path: &str) -> Result<()>;

    /// Write `content` to `path`, replacing any existing file. Returns the
    /// number of bytes written.
    fn put(&mut self, content: &mut dyn Read, path: &str) -> Result<u64>;

    /// Read the whole file at `path`; `None` when it does not exist.
    fn get(&mut self, path: &str) -> Result<Option<Vec<u8>>>;

    fn remove(&mut self, path: &str) -> Result<Removal>;

    /// Close the sub-channel and the session. Never fails; problems are
    /// logged and the state still becomes `Disconnected`.
    fn disconnect(&mut self);

    /// Make sure every segment of the absolute `path` exists as a directory.
    ///
    /// Idempotent. The lookup-then-create sequence is not atomic, so a create
    /// that fails because another client won the race is accepted as long as
    /// the directory is there afterwards.
    fn ensure_directory(&mut self, path: &str) -> Result<()> {
        let mut current = String::new();
        for segment in segments(path) {
            current = join_remote(&[current.as_str(), segment]);
            let presence = self
                .stat(&current)
                .map_err(|e| UploadError::directory(&current, e.to_string()))?;
            match presence {
                Presence::Directory => continue,
                Presence::File => {
                    return Err(UploadError::directory(&current, "exists and is not a directory"));
                }
                Presence::NotFound => {}
            }

            debug!("Creating remote directory {}", current);
            if let Err(create_err) = self.create_dir(&current) {
                match self.stat(&current) {
                    Ok(Presence::Directory) => {
                        debug!("Remote directory {} was created concurrently", current);
                    }
                    _ => return Err(create_err),
                }
            }
        }
        Ok(())
    }
}

/// Source of fresh sessions.
#[cfg_attr(test, mockall::automock)]
pub trait Connector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn RemoteFileStore>>;
}

/// Scoped ownership of one open session.
///
/// Dereferences to the store; disconnects it on drop.
pub struct SessionGuard {
    store: Box<dyn RemoteFileStore>,
}

impl SessionGuard {
    /// Open a session through `connector`.
    pub fn acquire(connector: &dyn Connector) -> Result<Self> {
        let store = connector.connect()?;
        Ok(Self { store })
    }
}

impl Deref for SessionGuard {
    type Target = dyn RemoteFileStore;

    fn deref(&self) -> &Self::Target {
        self.store.as_ref()
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.store.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.store.state() == SessionState::Disconnected {
            debug!("Session already disconnected before release");
            return;
        }
        self.store.disconnect();
    }
}
