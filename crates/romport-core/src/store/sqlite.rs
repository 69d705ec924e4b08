//! SQLite-backed record store.

use super::traits::RecordStore;
use super::{GameRecord, SkinRecord};
use crate::error::{Result, RomportError};
use crate::platform::Platform;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const GAME_COLUMNS: &str = "id, name, extension, platform, rom_file, imported_at, \
     pending_cover_lookup, cover_url, is_deleted";

const SKIN_COLUMNS: &str = "id, identifier, name, file_name, platform, imported_at";

/// Record store on a single SQLite connection.
///
/// Thread-safe via an internal mutex on the connection; each call is one
/// statement, so concurrent import tasks never observe a half-written record.
#[derive(Clone)]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Open (or create) a store at the given database path.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RomportError::Io {
                message: format!("Failed to create database directory: {}", e),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| RomportError::Database {
            message: format!("Failed to open library database: {}", e),
            source: Some(e),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| RomportError::Database {
                message: format!("Failed to set pragmas: {}", e),
                source: Some(e),
            })?;

        Self::from_connection(conn)
    }

    /// Open a store that lives only in memory.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| RomportError::Database {
            message: format!("Failed to lock database: {}", e),
            source: None,
        })
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS games (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                extension TEXT NOT NULL,
                platform TEXT NOT NULL,
                rom_file TEXT NOT NULL,
                imported_at TEXT NOT NULL,
                pending_cover_lookup INTEGER NOT NULL DEFAULT 0,
                cover_url TEXT,
                is_deleted INTEGER NOT NULL DEFAULT 0
            );

            -- Save matching looks games up by name
            CREATE INDEX IF NOT EXISTS idx_games_name ON games(name);

            CREATE TABLE IF NOT EXISTS skins (
                id TEXT PRIMARY KEY,
                identifier TEXT NOT NULL,
                name TEXT NOT NULL,
                file_name TEXT NOT NULL,
                platform TEXT NOT NULL,
                imported_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_skins_identifier ON skins(identifier);
            "#,
        )
        .map_err(|e| RomportError::Database {
            message: format!("Failed to initialize library schema: {}", e),
            source: Some(e),
        })?;

        Ok(())
    }

    fn row_to_game(row: &Row) -> rusqlite::Result<GameRecord> {
        let platform: String = row.get(3)?;
        let imported_at: String = row.get(5)?;

        Ok(GameRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            extension: row.get(2)?,
            platform: Platform::from_str(&platform).unwrap_or_default(),
            rom_file: row.get(4)?,
            imported_at: parse_timestamp(&imported_at),
            pending_cover_lookup: row.get(6)?,
            cover_url: row.get(7)?,
            is_deleted: row.get(8)?,
        })
    }

    fn row_to_skin(row: &Row) -> rusqlite::Result<SkinRecord> {
        let platform: String = row.get(4)?;
        let imported_at: String = row.get(5)?;

        Ok(SkinRecord {
            id: row.get(0)?,
            identifier: row.get(1)?,
            name: row.get(2)?,
            file_name: row.get(3)?,
            platform: Platform::from_str(&platform).unwrap_or_default(),
            imported_at: parse_timestamp(&imported_at),
        })
    }

    fn query_games(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<GameRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, Self::row_to_game)?;

        let mut games = Vec::new();
        for row in rows {
            games.push(row?);
        }
        Ok(games)
    }

    fn query_skins(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<SkinRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, Self::row_to_skin)?;

        let mut skins = Vec::new();
        for row in rows {
            skins.push(row?);
        }
        Ok(skins)
    }
}

impl RecordStore for SqliteRecordStore {
    fn find_game(&self, id: &str) -> Result<Option<GameRecord>> {
        let conn = self.lock()?;
        let game = conn
            .query_row(
                &format!("SELECT {} FROM games WHERE id = ?1", GAME_COLUMNS),
                params![id],
                Self::row_to_game,
            )
            .optional()?;
        Ok(game)
    }

    fn insert_game(&self, game: &GameRecord) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO games ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                GAME_COLUMNS
            ),
            params![
                game.id,
                game.name,
                game.extension,
                game.platform.as_str(),
                game.rom_file,
                game.imported_at.to_rfc3339(),
                game.pending_cover_lookup,
                game.cover_url,
                game.is_deleted,
            ],
        )
        .map_err(|e| RomportError::Database {
            message: format!("Failed to insert game {}: {}", game.id, e),
            source: Some(e),
        })?;

        debug!("Inserted game {} ({})", game.name, game.id);
        Ok(())
    }

    fn update_game(&self, game: &GameRecord) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE games SET name = ?2, extension = ?3, platform = ?4, rom_file = ?5, \
             pending_cover_lookup = ?6, cover_url = ?7, is_deleted = ?8 WHERE id = ?1",
            params![
                game.id,
                game.name,
                game.extension,
                game.platform.as_str(),
                game.rom_file,
                game.pending_cover_lookup,
                game.cover_url,
                game.is_deleted,
            ],
        )?;

        if changed == 0 {
            return Err(RomportError::Database {
                message: format!("No game with id {}", game.id),
                source: None,
            });
        }
        Ok(())
    }

    fn find_games_by_name(&self, name: &str) -> Result<Vec<GameRecord>> {
        self.query_games(
            &format!(
                "SELECT {} FROM games WHERE name = ?1 AND is_deleted = 0 \
                 ORDER BY imported_at, rowid",
                GAME_COLUMNS
            ),
            params![name],
        )
    }

    fn list_games(&self) -> Result<Vec<GameRecord>> {
        self.query_games(
            &format!(
                "SELECT {} FROM games WHERE is_deleted = 0 ORDER BY imported_at, rowid",
                GAME_COLUMNS
            ),
            params![],
        )
    }

    fn count_games(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM games WHERE is_deleted = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn find_skin(&self, id: &str) -> Result<Option<SkinRecord>> {
        let conn = self.lock()?;
        let skin = conn
            .query_row(
                &format!("SELECT {} FROM skins WHERE id = ?1", SKIN_COLUMNS),
                params![id],
                Self::row_to_skin,
            )
            .optional()?;
        Ok(skin)
    }

    fn find_skins_by_identifier(&self, identifier: &str) -> Result<Vec<SkinRecord>> {
        self.query_skins(
            &format!(
                "SELECT {} FROM skins WHERE identifier = ?1 ORDER BY imported_at, rowid",
                SKIN_COLUMNS
            ),
            params![identifier],
        )
    }

    fn insert_skin(&self, skin: &SkinRecord) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO skins ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                SKIN_COLUMNS
            ),
            params![
                skin.id,
                skin.identifier,
                skin.name,
                skin.file_name,
                skin.platform.as_str(),
                skin.imported_at.to_rfc3339(),
            ],
        )
        .map_err(|e| RomportError::Database {
            message: format!("Failed to insert skin {}: {}", skin.id, e),
            source: Some(e),
        })?;

        debug!("Inserted skin {} ({})", skin.identifier, skin.id);
        Ok(())
    }

    fn list_skins(&self) -> Result<Vec<SkinRecord>> {
        self.query_skins(
            &format!(
                "SELECT {} FROM skins ORDER BY imported_at, rowid",
                SKIN_COLUMNS
            ),
            params![],
        )
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
