//! Controller skin import.

use super::{install_files, restore_files, ImportContext};
use crate::config::ImportConfig;
use crate::error::{display_name, ImportError};
use crate::hashing::content_identity;
use crate::platform::Platform;
use crate::store::SkinRecord;
use chrono::Utc;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// The fields of a skin's `info.json` that the library cares about.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SkinManifest {
    pub identifier: String,
    pub name: String,
    /// Reverse-DNS game type, e.g. `com.rileytestut.delta.game.gba`.
    #[serde(default)]
    pub game_type_identifier: Option<String>,
}

impl SkinManifest {
    /// Platform named by the last segment of the game type identifier.
    pub(crate) fn platform(&self) -> Platform {
        self.game_type_identifier
            .as_deref()
            .and_then(|id| id.rsplit('.').next())
            .and_then(|system| {
                Platform::from_str(system).or_else(|| Platform::from_rom_extension(system))
            })
            .unwrap_or_default()
    }
}

/// Read and validate the manifest of a skin bundle.
pub(crate) fn read_manifest(path: &Path) -> Option<SkinManifest> {
    let file = File::open(path).ok()?;
    let mut archive = zip::ZipArchive::new(file).ok()?;
    let mut entry = archive.by_name(ImportConfig::SKIN_MANIFEST).ok()?;

    let mut content = String::new();
    entry.read_to_string(&mut content).ok()?;
    let manifest: SkinManifest = serde_json::from_str(&content).ok()?;

    (!manifest.identifier.trim().is_empty() && !manifest.name.trim().is_empty())
        .then_some(manifest)
}

/// Import one skin bundle.
pub(crate) fn import_skin(ctx: &ImportContext, path: &Path) -> Result<SkinRecord, ImportError> {
    let file_name = display_name(path);

    let manifest = read_manifest(path).ok_or_else(|| {
        debug!("{} has no usable {}", file_name, ImportConfig::SKIN_MANIFEST);
        ImportError::SkinMalformed {
            file_name: file_name.clone(),
        }
    })?;

    let hash = content_identity(path).map_err(|e| {
        debug!("Failed to hash {}: {}", path.display(), e);
        ImportError::BadFile {
            file_name: file_name.clone(),
        }
    })?;

    let skin_dir = ctx.layout.skin_dir(&hash);
    let _claim = ctx.claims.claim(&skin_dir).ok_or_else(|| {
        debug!("{} is being imported by another task", file_name);
        ImportError::FileAlreadyExists {
            file_name: file_name.clone(),
        }
    })?;

    let write_failed = |e: crate::error::RomportError| {
        warn!("Skin lookup for {} failed: {}", file_name, e);
        ImportError::WriteFailed {
            file_name: file_name.clone(),
        }
    };

    if let Some(skin) = ctx.store.find_skin(&hash).map_err(write_failed)? {
        let skin_path = skin_dir.join(&skin.file_name);
        if skin_path.exists() {
            return Err(ImportError::FileAlreadyExists { file_name });
        }

        restore_files(&skin_dir, &[(path, skin.file_name.clone())]).map_err(|e| {
            warn!("Failed to restore skin {}: {}", skin.name, e);
            ImportError::BadCopy {
                file_name: file_name.clone(),
            }
        })?;
        ctx.stored(&skin_path);
        debug!("Restored missing file of skin {}", skin.name);
        return Ok(skin);
    }

    let conflicts = ctx
        .store
        .find_skins_by_identifier(&manifest.identifier)
        .map_err(write_failed)?;
    if !conflicts.is_empty() {
        return Err(ImportError::SkinIdentifierConflict {
            identifier: manifest.identifier,
        });
    }

    install_files(&skin_dir, &[(path, file_name.clone())]).map_err(|e| {
        warn!("Failed to copy skin {}: {}", file_name, e);
        ImportError::BadCopy {
            file_name: file_name.clone(),
        }
    })?;

    let platform = manifest.platform();
    let skin = SkinRecord {
        id: hash,
        identifier: manifest.identifier,
        name: manifest.name,
        file_name: file_name.clone(),
        platform,
        imported_at: Utc::now(),
    };

    if let Err(e) = ctx.store.insert_skin(&skin) {
        if matches!(ctx.store.find_skin(&skin.id), Ok(Some(_))) {
            debug!("Skin {} was recorded concurrently: {}", skin.name, e);
            return Err(ImportError::FileAlreadyExists { file_name });
        }
        warn!("Failed to record skin {}: {}", skin.name, e);
        if let Err(e) = std::fs::remove_dir_all(&skin_dir) {
            warn!("Failed to remove {}: {}", skin_dir.display(), e);
        }
        return Err(ImportError::WriteFailed { file_name });
    }

    info!("Imported skin {} ({})", skin.name, skin.identifier);
    ctx.stored(&skin_dir.join(&skin.file_name));
    Ok(skin)
}
