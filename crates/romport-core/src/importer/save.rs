//! Save import: battery saves matched to games by name, and zipped save
//! bundles for 3DS and PSP.

use super::ImportContext;
use crate::archive::{extract_zip, ExtractFailure};
use crate::classify::extension_of;
use crate::config::ImportConfig;
use crate::error::{display_name, ImportError};
use crate::platform::Platform;
use crate::store::GameRecord;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// Kind of zipped save bundle, detected from the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SaveBundle {
    /// Entries under `sdmc/`, extracted as-is into the 3DS save root.
    ThreeDs,
    /// Entries with their first path component stripped, extracted into the
    /// PSP save root.
    Psp,
}

impl SaveBundle {
    pub(crate) fn detect(path: &Path) -> Option<Self> {
        let name = display_name(path).to_lowercase();
        if name.contains(ImportConfig::THREE_DS_SAVE_MARKER) {
            Some(SaveBundle::ThreeDs)
        } else if name.contains(ImportConfig::PSP_SAVE_MARKER) {
            Some(SaveBundle::Psp)
        } else {
            None
        }
    }

    /// Where an entry lands relative to the bundle's save root.
    fn map_entry(&self, entry: &Path) -> Option<PathBuf> {
        let mut parts = entry.components().filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        });
        match self {
            SaveBundle::ThreeDs => {
                let first = parts.next()?;
                (first == ImportConfig::THREE_DS_SAVE_ROOT).then(|| entry.to_path_buf())
            }
            SaveBundle::Psp => {
                parts.next()?;
                let rest: PathBuf = parts.collect();
                (!rest.as_os_str().is_empty()).then_some(rest)
            }
        }
    }
}

/// Import one save file.
///
/// Returns the name of the game the save was stored for, or the bundle file
/// name for save bundles.
pub(crate) fn import_save(ctx: &ImportContext, path: &Path) -> Result<String, ImportError> {
    if SaveBundle::detect(path).is_some() {
        return import_save_bundle(ctx, path, false);
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let required_platform = Platform::from_save_extension(&extension_of(path));

    let games: Vec<GameRecord> = ctx
        .store
        .find_games_by_name(&stem)
        .map_err(|e| {
            warn!("Save lookup for {} failed: {}", path.display(), e);
            ImportError::BadFile {
                file_name: display_name(path),
            }
        })?
        .into_iter()
        .filter(|g| required_platform.map_or(true, |p| g.platform == p))
        .collect();

    match games.len() {
        0 => Err(ImportError::SaveNoMatchingGame {
            save: path.to_path_buf(),
        }),
        1 => {
            let game = games.into_iter().next().ok_or(ImportError::SaveNoMatchingGame {
                save: path.to_path_buf(),
            })?;
            if ctx.layout.save_path(&game).exists() {
                return Err(ImportError::SaveAlreadyExists {
                    save: path.to_path_buf(),
                    game,
                });
            }
            store_save(ctx, path, &game)
        }
        _ => Err(ImportError::SaveAmbiguousMatch {
            save: path.to_path_buf(),
            candidates: games,
        }),
    }
}

/// Copy `save` to the save location of `game`, replacing any existing save.
pub(crate) fn store_save(
    ctx: &ImportContext,
    save: &Path,
    game: &GameRecord,
) -> Result<String, ImportError> {
    let dest = ctx.layout.save_path(game);
    let copied = (|| -> std::io::Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(save, &dest)?;
        Ok(())
    })();

    if let Err(e) = copied {
        warn!("Failed to store save {}: {}", save.display(), e);
        return Err(ImportError::BadCopy {
            file_name: display_name(save),
        });
    }

    info!("Stored save for {}", game.name);
    ctx.stored(&dest);
    Ok(game.name.clone())
}

/// Extract a zipped 3DS/PSP save bundle.
///
/// Without `overwrite`, any destination that already exists rejects the
/// whole bundle with `SaveBundleAlreadyExists`.
pub(crate) fn import_save_bundle(
    ctx: &ImportContext,
    path: &Path,
    overwrite: bool,
) -> Result<String, ImportError> {
    let file_name = display_name(path);
    let invalid = || ImportError::SaveBundleInvalid {
        file_name: file_name.clone(),
    };

    let bundle = SaveBundle::detect(path).ok_or_else(invalid)?;
    let root = match bundle {
        SaveBundle::ThreeDs => ctx.layout.three_ds_saves_dir(),
        SaveBundle::Psp => ctx.layout.psp_saves_dir(),
    };

    let entries = list_zip_files(path).map_err(|e| {
        debug!("Failed to read save bundle {}: {}", path.display(), e);
        invalid()
    })?;
    let destinations: Vec<PathBuf> = entries
        .iter()
        .filter_map(|entry| bundle.map_entry(entry))
        .map(|relative| root.join(relative))
        .collect();

    if destinations.is_empty() {
        return Err(invalid());
    }
    if !overwrite && destinations.iter().any(|d| d.exists()) {
        return Err(ImportError::SaveBundleAlreadyExists {
            bundle: path.to_path_buf(),
        });
    }

    let extracted = extract_zip(path, &root, |entry| bundle.map_entry(entry)).map_err(|e| {
        let reason = match e {
            ExtractFailure::Encrypted => "password protected".to_string(),
            ExtractFailure::Failed(reason) => reason,
        };
        ImportError::ArchiveExtractFailed {
            file_name: file_name.clone(),
            reason,
        }
    })?;

    for file in &extracted {
        ctx.stored(file);
    }
    info!("Extracted {} save file(s) from {}", extracted.len(), file_name);
    Ok(file_name)
}

fn list_zip_files(path: &Path) -> zip::result::ZipResult<Vec<PathBuf>> {
    let mut archive = zip::ZipArchive::new(fs::File::open(path)?)?;
    let mut files = Vec::new();
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i)?;
        if entry.is_dir() {
            continue;
        }
        if let Some(enclosed) = entry.enclosed_name() {
            files.push(enclosed);
        }
    }
    Ok(files)
}
