//! Extension-based file classification.
//!
//! The table is data, not code: defaults cover the supported platforms and
//! callers extend it through [`ExtensionRegistry::with_extension`] or a JSON
//! document, so the orchestrator never needs to change for a new format.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// What an imported file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Game,
    GameSave,
    Skin,
    Unrecognized,
}

/// Kinds an extension can be registered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisteredKind {
    Game,
    GameSave,
    Skin,
    Archive,
}

const GAME_EXTENSIONS: &[&str] = &[
    "gb", "gbc", "gba", "ds", "nds", "3ds", "cia", "app", "cci", "cxi", "3dsx", "nes", "fc",
    "smc", "sfc", "fig", "snes", "n64", "v64", "z64", "elf", "iso", "cso", "prx", "pbp", "chd",
    "md", "gen", "smd", "bin", "mcd", "32x", "sg", "gg", "sms", "bms", "ccd", "cue", "gdi",
    "m3u",
];

const SAVE_EXTENSIONS: &[&str] = &["sav", "srm", "dsv", "bkr"];

const SKIN_EXTENSIONS: &[&str] = &["manicskin", "deltaskin"];

const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "7z"];

/// Lookup table from lowercase extension to kind.
#[derive(Debug, Clone)]
pub struct ExtensionRegistry {
    table: HashMap<String, RegisteredKind>,
}

impl ExtensionRegistry {
    /// Registry with no extensions.
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// Register (or re-register) an extension.
    pub fn with_extension(mut self, ext: &str, kind: RegisteredKind) -> Self {
        self.insert(ext, kind);
        self
    }

    pub fn insert(&mut self, ext: &str, kind: RegisteredKind) {
        self.table
            .insert(ext.trim_start_matches('.').to_lowercase(), kind);
    }

    /// Merge overrides expressed as `{ "ext": "game" | "game_save" | "skin" | "archive" }`.
    pub fn extend_from_json(&mut self, json: &str) -> Result<()> {
        let overrides: HashMap<String, RegisteredKind> = serde_json::from_str(json)?;
        for (ext, kind) in overrides {
            self.insert(&ext, kind);
        }
        Ok(())
    }

    /// Default registry extended with JSON overrides.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut registry = Self::default();
        registry.extend_from_json(json)?;
        Ok(registry)
    }

    /// Classify an extension (case-insensitive, leading dot tolerated).
    pub fn classify(&self, ext: &str) -> FileKind {
        match self.lookup(ext) {
            Some(RegisteredKind::Game) => FileKind::Game,
            Some(RegisteredKind::GameSave) => FileKind::GameSave,
            Some(RegisteredKind::Skin) => FileKind::Skin,
            Some(RegisteredKind::Archive) | None => FileKind::Unrecognized,
        }
    }

    /// Classify a path by its extension.
    pub fn classify_path(&self, path: &Path) -> FileKind {
        self.classify(&extension_of(path))
    }

    pub fn is_archive(&self, ext: &str) -> bool {
        self.lookup(ext) == Some(RegisteredKind::Archive)
    }

    pub fn is_archive_path(&self, path: &Path) -> bool {
        self.is_archive(&extension_of(path))
    }

    /// Whether an extension is importable on its own (not an archive).
    pub fn is_recognized(&self, ext: &str) -> bool {
        self.classify(ext) != FileKind::Unrecognized
    }

    fn lookup(&self, ext: &str) -> Option<RegisteredKind> {
        self.table
            .get(&ext.trim_start_matches('.').to_lowercase())
            .copied()
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for (exts, kind) in [
            (GAME_EXTENSIONS, RegisteredKind::Game),
            (SAVE_EXTENSIONS, RegisteredKind::GameSave),
            (SKIN_EXTENSIONS, RegisteredKind::Skin),
            (ARCHIVE_EXTENSIONS, RegisteredKind::Archive),
        ] {
            for ext in exts {
                registry.insert(ext, kind);
            }
        }
        registry
    }
}

/// Lowercased extension of a path, empty when there is none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
