//! Persisted user settings and atomic JSON writes.
//!
//! Settings are written through a temp file in the same directory, synced to
//! disk and renamed over the target, so a crash mid-write leaves either the
//! old or the new file and never a truncated one.

use crate::classify::{ExtensionRegistry, RegisteredKind};
use crate::config::{ImportConfig, PathsConfig};
use crate::error::{Result, RomportError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read and parse a JSON file, `None` when it does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(RomportError::io_with_path(e, path)),
    };

    let data = serde_json::from_str(&contents).map_err(|e| RomportError::Json {
        message: format!("Failed to parse {}: {}", path.display(), e),
        source: Some(e),
    })?;
    Ok(Some(data))
}

/// Serialize `data` to `path` atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| RomportError::io_with_path(e, parent))?;
    }

    let serialized = serde_json::to_string_pretty(data)?;
    let temp_path = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));

    let written = (|| -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;
        file.write_all(serialized.as_bytes())?;
        file.sync_all()
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(RomportError::io_with_path(e, &temp_path));
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        RomportError::io_with_path(e, path)
    })?;

    debug!("Wrote {}", path.display());
    Ok(())
}

/// User-adjustable settings stored in `settings.json` under the data root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Whether cloud reconciliation runs on lifecycle events.
    pub sync_enabled: bool,
    /// Upper bound on concurrently running per-item imports.
    pub max_concurrent_imports: usize,
    /// Extra classifier entries, extension to kind.
    pub extra_extensions: HashMap<String, RegisteredKind>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sync_enabled: false,
            max_concurrent_imports: ImportConfig::DEFAULT_MAX_CONCURRENT_IMPORTS,
            extra_extensions: HashMap::new(),
        }
    }
}

impl Settings {
    /// Location of the settings file under a data root.
    pub fn path_in(root: &Path) -> PathBuf {
        root.join(PathsConfig::SETTINGS_FILENAME)
    }

    /// Load settings, falling back to defaults when the file is absent.
    pub fn load(root: &Path) -> Result<Self> {
        Ok(read_json(&Self::path_in(root))?.unwrap_or_default())
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        write_json_atomic(&Self::path_in(root), self)
    }

    /// Classifier built from the defaults plus `extra_extensions`.
    pub fn extension_registry(&self) -> ExtensionRegistry {
        let mut registry = ExtensionRegistry::default();
        for (ext, kind) in &self.extra_extensions {
            registry.insert(ext, *kind);
        }
        registry
    }

    pub fn effective_concurrency(&self) -> usize {
        self.max_concurrent_imports.max(1)
    }
}
