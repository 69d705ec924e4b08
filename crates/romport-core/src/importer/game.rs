//! Game import: dedup by content hash, copy, record.

use super::{install_files, restore_files, ImportContext};
use crate::classify::extension_of;
use crate::error::{display_name, ImportError};
use crate::hashing::content_identity;
use crate::multifile::file_name_of;
use crate::platform::Platform;
use crate::store::GameRecord;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Import one game.
///
/// `rom` is the file the game launches from (a plain ROM or a cue/gdi/m3u
/// descriptor); `members` are the other files of a multi-file set, copied
/// next to it under their own names.
///
/// Returns the record and whether it was newly created (as opposed to an
/// existing record whose files were restored).
pub(crate) fn import_game(
    ctx: &ImportContext,
    rom: &Path,
    members: &[PathBuf],
) -> Result<(GameRecord, bool), ImportError> {
    let file_name = display_name(rom);

    let hash = content_identity(rom).map_err(|e| {
        debug!("Failed to hash {}: {}", rom.display(), e);
        ImportError::BadFile {
            file_name: file_name.clone(),
        }
    })?;

    let rom_dir = ctx.layout.rom_dir(&hash);
    let _claim = ctx.claims.claim(&rom_dir).ok_or_else(|| {
        debug!("{} is being imported by another task", file_name);
        ImportError::FileAlreadyExists {
            file_name: file_name.clone(),
        }
    })?;

    let existing = ctx.store.find_game(&hash).map_err(|e| {
        warn!("Game lookup for {} failed: {}", file_name, e);
        ImportError::WriteFailed {
            file_name: file_name.clone(),
        }
    })?;

    if let Some(game) = existing {
        let rom_path = ctx.layout.rom_path(&game);
        if rom_path.exists() {
            debug!("{} is already in the library as {}", file_name, game.id);
            return Err(ImportError::FileAlreadyExists { file_name });
        }

        let files = copy_list(rom, &game.rom_file, members);
        restore_files(&rom_dir, &files).map_err(|e| {
            warn!("Failed to restore files of {}: {}", game.name, e);
            ImportError::BadCopy {
                file_name: game.name.clone(),
            }
        })?;

        ctx.stored(&rom_path);
        debug!("Restored missing files of {}", game.name);
        return Ok((game, false));
    }

    let extension = extension_of(rom);
    let name = rom
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.clone());

    let platform = Platform::from_rom_extension(&extension).ok_or_else(|| {
        ImportError::UnsupportedExtension {
            file_name: file_name.clone(),
        }
    })?;

    let files = copy_list(rom, &file_name, members);
    install_files(&rom_dir, &files).map_err(|e| {
        warn!("Failed to copy {} into the library: {}", file_name, e);
        ImportError::BadCopy {
            file_name: name.clone(),
        }
    })?;

    let mut game = GameRecord::new(hash, name, extension, platform, file_name);
    game.pending_cover_lookup = true;

    if let Err(e) = ctx.store.insert_game(&game) {
        if matches!(ctx.store.find_game(&game.id), Ok(Some(_))) {
            // Recorded by someone else meanwhile; the directory is theirs.
            debug!("{} was recorded concurrently: {}", game.rom_file, e);
            return Err(ImportError::FileAlreadyExists {
                file_name: game.rom_file,
            });
        }
        warn!("Failed to record {}: {}", game.name, e);
        if let Err(e) = std::fs::remove_dir_all(&rom_dir) {
            warn!("Failed to remove {}: {}", rom_dir.display(), e);
        }
        return Err(ImportError::WriteFailed {
            file_name: game.name,
        });
    }

    ctx.stored(&ctx.layout.rom_path(&game));
    Ok((game, true))
}

fn copy_list<'a>(rom: &'a Path, rom_name: &str, members: &'a [PathBuf]) -> Vec<(&'a Path, String)> {
    let mut files = vec![(rom, rom_name.to_string())];
    files.extend(members.iter().map(|m| (m.as_path(), file_name_of(m))));
    files
}
