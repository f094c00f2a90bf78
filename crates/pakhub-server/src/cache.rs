//! Disk-cache persistence worker.
//!
//! Patch content survives restarts through a write-behind disk cache. The
//! event-loop thread never touches the disk: after mutating the registry
//! it enqueues a command carrying refcounted payload clones, and a
//! dedicated worker thread applies the commands in FIFO order with a
//! blocking `recv`. Cache failures are logged and degrade durability only;
//! they never fail a request.
//!
//! Disk layout: `<cache_root>/<platform>_<revision>/<patch-name>`, raw
//! payload bytes, no metadata sidecars.

use crate::error::CacheError;
use pakhub_protocol::{Patch, PatchKey};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::JoinHandle;

/// Work item for the persistence thread.
#[derive(Debug)]
pub enum CacheCommand {
    /// Write the patches for a key to disk
    Store {
        /// Key the patches are filed under
        key: PatchKey,
        /// Payload clones, owned by the command
        patches: Vec<Patch>,
    },
    /// Remove a key's directory from disk
    Remove {
        /// Key to remove
        key: PatchKey,
    },
    /// Drain and exit
    Shutdown,
}

/// Sending side of the cache channel, held by the dispatcher.
#[derive(Debug, Clone)]
pub struct CacheHandle {
    tx: mpsc::Sender<CacheCommand>,
}

impl CacheHandle {
    /// Enqueue a store for a key. Payloads are refcounted clones; the
    /// registry is never read from the worker thread.
    pub fn store(&self, key: PatchKey, patches: Vec<Patch>) {
        if self
            .tx
            .send(CacheCommand::Store { key, patches })
            .is_err()
        {
            tracing::error!("cache worker gone, store dropped");
        }
    }

    /// Enqueue a removal for a key.
    pub fn remove(&self, key: PatchKey) {
        if self.tx.send(CacheCommand::Remove { key }).is_err() {
            tracing::error!("cache worker gone, remove dropped");
        }
    }
}

/// The persistence thread and its command channel.
///
/// Dropping the worker sends `Shutdown` and joins the thread, which drains
/// every command queued before the shutdown marker.
#[derive(Debug)]
pub struct CacheWorker {
    tx: mpsc::Sender<CacheCommand>,
    thread: Option<JoinHandle<()>>,
}

impl CacheWorker {
    /// Create the cache root if needed and start the worker thread.
    pub fn spawn(root: PathBuf) -> Result<Self, CacheError> {
        fs::create_dir_all(&root).map_err(|source| CacheError::Io {
            path: root.clone(),
            source,
        })?;
        let (tx, rx) = mpsc::channel();
        let thread = std::thread::Builder::new()
            .name("pakhub-cache".to_string())
            .spawn(move || run(&root, &rx))
            .map_err(CacheError::Spawn)?;
        Ok(Self {
            tx,
            thread: Some(thread),
        })
    }

    /// A cloneable sender for enqueuing commands.
    #[must_use]
    pub fn handle(&self) -> CacheHandle {
        CacheHandle {
            tx: self.tx.clone(),
        }
    }
}

impl Drop for CacheWorker {
    fn drop(&mut self) {
        let _ = self.tx.send(CacheCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("cache worker panicked");
            }
        }
    }
}

fn run(root: &Path, rx: &mpsc::Receiver<CacheCommand>) {
    tracing::debug!(root = %root.display(), "cache worker started");
    while let Ok(command) = rx.recv() {
        match command {
            CacheCommand::Store { key, patches } => {
                if let Err(e) = store(root, &key, &patches) {
                    tracing::warn!(key = %key, "cache store failed: {e}");
                }
            }
            CacheCommand::Remove { key } => {
                if let Err(e) = remove(root, &key) {
                    tracing::warn!(key = %key, "cache remove failed: {e}");
                }
            }
            CacheCommand::Shutdown => break,
        }
    }
    tracing::debug!("cache worker stopped");
}

fn store(root: &Path, key: &PatchKey, patches: &[Patch]) -> Result<(), CacheError> {
    let dir = root.join(key.cache_dir_name());
    fs::create_dir_all(&dir).map_err(|source| CacheError::Io {
        path: dir.clone(),
        source,
    })?;
    for patch in patches {
        let Some(name) = safe_file_name(&patch.name) else {
            tracing::warn!(key = %key, name = %patch.name, "unsafe patch name, not cached");
            continue;
        };
        let path = dir.join(name);
        fs::write(&path, &patch.data).map_err(|source| CacheError::Io { path, source })?;
    }
    tracing::debug!(key = %key, count = patches.len(), "patches cached");
    Ok(())
}

fn remove(root: &Path, key: &PatchKey) -> Result<(), CacheError> {
    let dir = root.join(key.cache_dir_name());
    match fs::remove_dir_all(&dir) {
        Ok(()) => {
            tracing::debug!(key = %key, "cache entry removed");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(CacheError::Io { path: dir, source }),
    }
}

/// A patch name usable as a single path component. Rejects anything that
/// could escape the key directory.
fn safe_file_name(name: &str) -> Option<&str> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return None;
    }
    Some(name)
}

/// Load everything the cache holds, for registry restore at startup.
///
/// Directories whose names do not parse as a key are skipped with a
/// warning, as are unreadable files. A missing cache root yields an empty
/// result.
pub fn restore(root: &Path) -> Result<Vec<(PatchKey, Vec<Patch>)>, CacheError> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(CacheError::Io {
                path: root.to_path_buf(),
                source,
            });
        }
    };

    let mut restored = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| CacheError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let dir_name = entry.file_name();
        let Some(key) = dir_name
            .to_str()
            .and_then(PatchKey::parse_cache_dir_name)
        else {
            tracing::warn!(path = %path.display(), "unrecognized cache directory, skipped");
            continue;
        };
        let patches = load_key_dir(&path)?;
        tracing::debug!(key = %key, count = patches.len(), "cache entry restored");
        restored.push((key, patches));
    }
    Ok(restored)
}

fn load_key_dir(dir: &Path) -> Result<Vec<Patch>, CacheError> {
    let mut patches = Vec::new();
    let entries = fs::read_dir(dir).map_err(|source| CacheError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| CacheError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            tracing::warn!(path = %path.display(), "non-UTF-8 cache file name, skipped");
            continue;
        };
        let data = fs::read(&path).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;
        patches.push(Patch::new(name, data));
    }
    // read_dir order is platform-dependent
    patches.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(patches)
}
