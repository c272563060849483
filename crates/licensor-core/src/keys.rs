//! ---
//! lic_section: "01-license-core"
//! lic_subsection: "module"
//! lic_type: "source"
//! lic_scope: "code"
//! lic_description: "Byte-level key loading boundary."
//! lic_version: "v0.1.0"
//! lic_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::KeyLoadError;

/// Source of raw key bytes addressed by path.
///
/// Implementations only fetch bytes; interpreting them is left to the
/// signing engine.
pub trait KeyStore {
    /// Return the bytes stored at `path`.
    fn load(&self, path: &Path) -> Result<Vec<u8>, KeyLoadError>;
}

/// Reads keys from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileKeyStore;

impl KeyStore for FileKeyStore {
    fn load(&self, path: &Path) -> Result<Vec<u8>, KeyLoadError> {
        debug!(key_path = %path.display(), "loading key material");
        fs::read(path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => KeyLoadError::NotFound(path.to_path_buf()),
            _ => KeyLoadError::Unreadable {
                path: path.to_path_buf(),
                source,
            },
        })
    }
}

/// In-memory key store, useful for tests and embedding.
#[derive(Clone, Default)]
pub struct MemoryKeyStore {
    keys: HashMap<PathBuf, Vec<u8>>,
}

impl MemoryKeyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register key bytes under `path`.
    #[must_use]
    pub fn with_key(mut self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        self.keys.insert(path.into(), bytes.into());
        self
    }
}

impl KeyStore for MemoryKeyStore {
    fn load(&self, path: &Path) -> Result<Vec<u8>, KeyLoadError> {
        self.keys
            .get(path)
            .cloned()
            .ok_or_else(|| KeyLoadError::NotFound(path.to_path_buf()))
    }
}

impl fmt::Debug for MemoryKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryKeyStore")
            .field("paths", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<K: KeyStore + ?Sized> KeyStore for &K {
    fn load(&self, path: &Path) -> Result<Vec<u8>, KeyLoadError> {
        (**self).load(path)
    }
}
