//! On-disk layout of a library data root.
//!
//! ```text
//! <root>/
//!   library.db
//!   settings.json
//!   roms/<hash>/<rom files>
//!   saves/<game id>/<name>.<save ext>
//!   saves/3ds/...
//!   saves/psp/...
//!   skins/<hash>/<skin file>
//!   scratch/            (archive expansion, cleared per batch)
//! ```

use crate::config::{ImportConfig, PathsConfig};
use crate::error::{Result, RomportError};
use crate::store::GameRecord;
use std::path::{Path, PathBuf};

/// Path helpers rooted at a library data directory.
#[derive(Debug, Clone)]
pub struct LibraryLayout {
    root: PathBuf,
}

impl LibraryLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the top-level directories.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.roms_dir(),
            self.saves_dir(),
            self.skins_dir(),
            self.scratch_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| RomportError::io_with_path(e, &dir))?;
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(PathsConfig::DATABASE_FILENAME)
    }

    pub fn roms_dir(&self) -> PathBuf {
        self.root.join(PathsConfig::ROMS_DIR_NAME)
    }

    /// Directory holding every file of one game.
    pub fn rom_dir(&self, hash: &str) -> PathBuf {
        self.roms_dir().join(hash)
    }

    /// Launch file of a game.
    pub fn rom_path(&self, game: &GameRecord) -> PathBuf {
        self.rom_dir(&game.id).join(&game.rom_file)
    }

    pub fn saves_dir(&self) -> PathBuf {
        self.root.join(PathsConfig::SAVES_DIR_NAME)
    }

    /// Battery save of a game, named after the game with its platform's save
    /// extension.
    pub fn save_path(&self, game: &GameRecord) -> PathBuf {
        self.saves_dir().join(&game.id).join(format!(
            "{}.{}",
            game.name,
            game.platform.save_extension()
        ))
    }

    pub fn three_ds_saves_dir(&self) -> PathBuf {
        self.saves_dir().join(PathsConfig::THREE_DS_SAVES_DIR_NAME)
    }

    pub fn psp_saves_dir(&self) -> PathBuf {
        self.saves_dir().join(PathsConfig::PSP_SAVES_DIR_NAME)
    }

    pub fn skins_dir(&self) -> PathBuf {
        self.root.join(PathsConfig::SKINS_DIR_NAME)
    }

    pub fn skin_dir(&self, hash: &str) -> PathBuf {
        self.skins_dir().join(hash)
    }

    /// Scratch space for archive expansion.
    pub fn scratch_dir(&self) -> PathBuf {
        self.root.join(PathsConfig::SCRATCH_DIR_NAME)
    }

    /// Fresh staging directory path next to `parent`. Not created.
    pub fn staging_dir(parent: &Path) -> PathBuf {
        parent.join(format!(
            "{}{}",
            ImportConfig::STAGING_PREFIX,
            uuid::Uuid::new_v4().simple()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let layout = LibraryLayout::new("/data");
        let game = GameRecord::new("abc", "Pokemon", "nds", Platform::Nds, "Pokemon.nds");

        assert_eq!(layout.rom_path(&game), PathBuf::from("/data/roms/abc/Pokemon.nds"));
        assert_eq!(
            layout.save_path(&game),
            PathBuf::from("/data/saves/abc/Pokemon.dsv")
        );
        assert_eq!(layout.three_ds_saves_dir(), PathBuf::from("/data/saves/3ds"));
        assert_eq!(layout.skin_dir("h"), PathBuf::from("/data/skins/h"));
    }

    #[test]
    fn test_staging_dirs_are_unique() {
        let parent = Path::new("/data/roms");
        let a = LibraryLayout::staging_dir(parent);
        let b = LibraryLayout::staging_dir(parent);
        assert_ne!(a, b);
        assert!(a
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(ImportConfig::STAGING_PREFIX));
    }

    #[test]
    fn test_ensure_dirs() {
        let dir = TempDir::new().unwrap();
        let layout = LibraryLayout::new(dir.path());
        layout.ensure_dirs().unwrap();
        assert!(layout.roms_dir().is_dir());
        assert!(layout.scratch_dir().is_dir());
    }
}
