//! Per-plugin settings persistence
//!
//! Every plugin owns one opaque JSON blob keyed by its id. The whole map lives
//! in memory and is rewritten to a single document on every persist:
//!
//! ```json
//! {
//!     "plugins": {
//!         "heartbeat": {"interval-secs":5,"enabled":true}
//!     }
//! }
//! ```
//!
//! Blobs are stored as [`RawValue`] so the bytes a plugin saved are the bytes
//! it reads back.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::value::RawValue;

use crate::{Error, Result};

/// Indent used when writing the settings document
const INDENT: &[u8] = b"    ";

#[derive(Deserialize)]
struct SettingsDocument {
    #[serde(default)]
    plugins: BTreeMap<String, Box<RawValue>>,
}

#[derive(Serialize)]
struct SettingsDocumentRef<'a> {
    plugins: &'a BTreeMap<String, Box<RawValue>>,
}

/// File-backed map from plugin id to raw JSON settings
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    blobs: RwLock<BTreeMap<String, Box<RawValue>>>,
    /// Held across snapshot and write so persists land in order
    write_lock: Mutex<()>,
}

impl SettingsStore {
    /// Create an empty store that will persist to `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            blobs: RwLock::new(BTreeMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Load the store from `path`
    ///
    /// A missing file yields an empty store which is written out immediately.
    ///
    /// # Errors
    ///
    /// Returns `Error::Settings` if the file exists but cannot be decoded, or
    /// an IO error if it cannot be read or created
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(path);

        if !store.path.exists() {
            tracing::info!(path = %store.path.display(), "settings file missing, creating");
            store.persist()?;
            return Ok(store);
        }

        let bytes = std::fs::read(&store.path)?;
        let doc: SettingsDocument = serde_json::from_slice(&bytes).map_err(|e| {
            Error::Settings(format!("failed to decode {}: {e}", store.path.display()))
        })?;

        tracing::debug!(
            path = %store.path.display(),
            count = doc.plugins.len(),
            "loaded plugin settings"
        );
        *store.blobs.write() = doc.plugins;

        Ok(store)
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current blob for `id`, if any
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Box<RawValue>> {
        self.blobs.read().get(id).cloned()
    }

    /// Replace the blob for `id`
    ///
    /// Visible to `get` as soon as this returns; call [`Self::persist`] to
    /// flush it to disk.
    pub fn set(&self, id: &str, blob: Box<RawValue>) {
        self.blobs.write().insert(id.to_string(), blob);
    }

    /// Ids with a stored blob, sorted
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.blobs.read().keys().cloned().collect()
    }

    /// Write the whole map to disk
    ///
    /// The document goes to a temporary file in the target directory first
    /// and is then renamed over the previous one.
    ///
    /// # Errors
    ///
    /// Returns error if encoding, directory creation, or the write fails
    pub fn persist(&self) -> Result<()> {
        let _guard = self.write_lock.lock();

        let encoded = {
            let blobs = self.blobs.read();
            encode(&blobs)?
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&encoded)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::trace!(path = %self.path.display(), bytes = encoded.len(), "settings persisted");
        Ok(())
    }
}

fn encode(blobs: &BTreeMap<String, Box<RawValue>>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    SettingsDocumentRef { plugins: blobs }.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}
