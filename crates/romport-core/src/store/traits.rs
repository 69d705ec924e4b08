//! Record store trait.

use super::{GameRecord, SkinRecord};
use crate::error::Result;

/// Persistence for game and skin records.
///
/// Implementations must be safe to call from several blocking import tasks at
/// once; every method is a single atomic operation.
pub trait RecordStore: Send + Sync {
    /// Look up a game by content hash, including soft-deleted ones.
    fn find_game(&self, id: &str) -> Result<Option<GameRecord>>;

    /// Insert a new game. Fails if the id already exists.
    fn insert_game(&self, game: &GameRecord) -> Result<()>;

    /// Replace the stored fields of an existing game.
    fn update_game(&self, game: &GameRecord) -> Result<()>;

    /// Non-deleted games whose name equals `name`, in import order.
    fn find_games_by_name(&self, name: &str) -> Result<Vec<GameRecord>>;

    /// All non-deleted games, in import order.
    fn list_games(&self) -> Result<Vec<GameRecord>>;

    /// Number of non-deleted games.
    fn count_games(&self) -> Result<usize>;

    fn find_skin(&self, id: &str) -> Result<Option<SkinRecord>>;

    fn find_skins_by_identifier(&self, identifier: &str) -> Result<Vec<SkinRecord>>;

    fn insert_skin(&self, skin: &SkinRecord) -> Result<()>;

    fn list_skins(&self) -> Result<Vec<SkinRecord>>;
}
