//! Library records and their storage.
//!
//! The import pipeline creates, reads and mutates two record kinds, games and
//! skins. Storage sits behind [`RecordStore`] so the pipeline does not care
//! whether records live in SQLite or in a test double.

mod sqlite;
mod traits;

pub use sqlite::SqliteRecordStore;
pub use traits::RecordStore;

use crate::platform::Platform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An imported game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Content hash of the ROM (or descriptor), also the rom directory name.
    pub id: String,
    /// Display name, the file stem at import time.
    pub name: String,
    /// Lowercased extension of the ROM or descriptor.
    pub extension: String,
    pub platform: Platform,
    /// File name inside `roms/<id>/` that launches the game.
    pub rom_file: String,
    pub imported_at: DateTime<Utc>,
    /// Set until the cover matcher has run for this game.
    pub pending_cover_lookup: bool,
    pub cover_url: Option<String>,
    pub is_deleted: bool,
}

impl GameRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        extension: impl Into<String>,
        platform: Platform,
        rom_file: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            extension: extension.into(),
            platform,
            rom_file: rom_file.into(),
            imported_at: Utc::now(),
            pending_cover_lookup: false,
            cover_url: None,
            is_deleted: false,
        }
    }
}

/// An imported controller skin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkinRecord {
    /// Content hash of the skin bundle.
    pub id: String,
    /// Identifier declared in the skin manifest, unique per library.
    pub identifier: String,
    pub name: String,
    /// File name inside `skins/<id>/`.
    pub file_name: String,
    pub platform: Platform,
    pub imported_at: DateTime<Utc>,
}
