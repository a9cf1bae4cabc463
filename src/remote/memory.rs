use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::error::{Result, UploadError};
use crate::remote::{Connector, Presence, Removal, RemoteFileStore, SessionState};
use crate::security::join_remote;

#[derive(Default)]
struct MemoryFs {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryFs {
    fn presence(&self, path: &str) -> Presence {
        if path == "/" || self.dirs.contains(path) {
            Presence::Directory
        } else if self.files.contains_key(path) {
            Presence::File
        } else {
            Presence::NotFound
        }
    }
}

#[derive(Default)]
struct Faults {
    refuse_connections: bool,
    fail_transfers: bool,
    fail_lookups: bool,
    /// Directories another client creates right after our first lookup
    racing_dirs: BTreeSet<String>,
}

#[derive(Default)]
struct Shared {
    fs: Mutex<MemoryFs>,
    faults: Mutex<Faults>,
    opened: AtomicUsize,
    open_now: AtomicUsize,
}

impl Shared {
    fn fs(&self) -> MutexGuard<'_, MemoryFs> {
        self.fs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn parent_of(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((parent, _)) => parent,
    }
}

/// Connector for an in-process remote filesystem.
///
/// Clones share the same filesystem and counters, so a test can keep one
/// handle for assertions while the pipeline owns another.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    shared: Arc<Shared>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `connect` fail, as if the host were unreachable.
    pub fn refuse_connections(&self, refuse: bool) {
        self.shared.faults().refuse_connections = refuse;
    }

    /// Make put/get/remove fail with a transfer error.
    pub fn fail_transfers(&self, fail: bool) {
        self.shared.faults().fail_transfers = fail;
    }

    /// Make `stat` fail with a transfer error.
    pub fn fail_lookups(&self, fail: bool) {
        self.shared.faults().fail_lookups = fail;
    }

    /// Simulate another client creating `path` between our lookup and our
    /// create call.
    pub fn race_directory_creation(&self, path: &str) {
        self.shared.faults().racing_dirs.insert(join_remote(&[path]));
    }

    /// Total sessions ever opened.
    pub fn sessions_opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    /// Sessions opened but not yet disconnected.
    pub fn open_sessions(&self) -> usize {
        self.shared.open_now.load(Ordering::SeqCst)
    }

    pub fn has_directory(&self, path: &str) -> bool {
        self.shared.fs().presence(&join_remote(&[path])) == Presence::Directory
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.shared.fs().files.get(&join_remote(&[path])).cloned()
    }

    /// Place a file directly, creating its parent directories.
    pub fn insert_file(&self, path: &str, content: Vec<u8>) {
        let path = join_remote(&[path]);
        let mut fs = self.shared.fs();
        let mut dir = parent_of(&path).to_string();
        while dir != "/" {
            let next = parent_of(&dir).to_string();
            fs.dirs.insert(dir);
            dir = next;
        }
        fs.files.insert(path, content);
    }

    /// All file paths currently stored, in order.
    pub fn file_paths(&self) -> Vec<String> {
        self.shared.fs().files.keys().cloned().collect()
    }
}

impl Connector for MemoryConnector {
    fn connect(&self) -> Result<Box<dyn RemoteFileStore>> {
        if self.shared.faults().refuse_connections {
            return Err(UploadError::Connection(
                "connection refused by in-memory store".into(),
            ));
        }
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        self.shared.open_now.fetch_add(1, Ordering::SeqCst);
        debug!("Opened in-memory session");
        Ok(Box::new(MemoryStore {
            shared: Arc::clone(&self.shared),
            state: SessionState::Connected,
        }))
    }
}

/// One session against a [`MemoryConnector`]'s filesystem.
pub struct MemoryStore {
    shared: Arc<Shared>,
    state: SessionState,
}

impl MemoryStore {
    fn ensure_connected(&self) -> Result<()> {
        if self.state != SessionState::Connected {
            return Err(UploadError::Connection(format!(
                "session is {}, not connected",
                self.state
            )));
        }
        Ok(())
    }

    fn check_transfer_fault(&self, action: &str, path: &str) -> Result<()> {
        if self.shared.faults().fail_transfers {
            return Err(UploadError::Transfer(format!(
                "{} {} failed: injected fault",
                action, path
            )));
        }
        Ok(())
    }
}

impl RemoteFileStore for MemoryStore {
    fn state(&self) -> SessionState {
        self.state
    }

    fn stat(&mut self, path: &str) -> Result<Presence> {
        self.ensure_connected()?;
        if self.shared.faults().fail_lookups {
            return Err(UploadError::Transfer(format!("stat {} failed: injected fault", path)));
        }
        let presence = self.shared.fs().presence(path);
        if presence == Presence::NotFound && self.shared.faults().racing_dirs.remove(path) {
            self.shared.fs().dirs.insert(path.to_string());
        }
        Ok(presence)
    }

    fn create_dir(&mut self, path: &str) -> Result<()> {
        self.ensure_connected()?;
        let mut fs = self.shared.fs();
        if fs.presence(parent_of(path)) != Presence::Directory {
            return Err(UploadError::directory(path, "no such parent directory"));
        }
        if fs.presence(path) != Presence::NotFound {
            return Err(UploadError::directory(path, "already exists"));
        }
        fs.dirs.insert(path.to_string());
        Ok(())
    }

    fn put(&mut self, content: &mut dyn Read, path: &str) -> Result<u64> {
        self.ensure_connected()?;
        self.check_transfer_fault("put", path)?;

        let mut bytes = Vec::new();
        content
            .read_to_end(&mut bytes)
            .map_err(|e| UploadError::transfer(&format!("reading upload for {}", path), &e))?;

        let mut fs = self.shared.fs();
        match fs.presence(parent_of(path)) {
            Presence::Directory => {}
            _ => {
                return Err(UploadError::Transfer(format!(
                    "put {} failed: no such directory",
                    path
                )))
            }
        }
        if fs.presence(path) == Presence::Directory {
            return Err(UploadError::Transfer(format!("put {} failed: is a directory", path)));
        }
        let written = bytes.len() as u64;
        fs.files.insert(path.to_string(), bytes);
        Ok(written)
    }

    fn get(&mut self, path: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_connected()?;
        self.check_transfer_fault("get", path)?;
        Ok(self.shared.fs().files.get(path).cloned())
    }

    fn remove(&mut self, path: &str) -> Result<Removal> {
        self.ensure_connected()?;
        self.check_transfer_fault("remove", path)?;
        match self.shared.fs().files.remove(path) {
            Some(_) => Ok(Removal::Removed),
            None => Ok(Removal::NotFound),
        }
    }

    fn disconnect(&mut self) {
        if self.state != SessionState::Disconnected {
            self.shared.open_now.fetch_sub(1, Ordering::SeqCst);
            debug!("Closed in-memory session");
        }
        self.state = SessionState::Disconnected;
    }
}
