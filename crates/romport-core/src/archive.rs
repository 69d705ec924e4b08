//! Archive expansion for import batches.
//!
//! Archives (`.zip`, `.7z`) among the inputs are unpacked into the scratch
//! directory and replaced by the importable files they contain. Everything
//! else passes through untouched and keeps its position at the front of the
//! output.

use crate::classify::{extension_of, ExtensionRegistry};
use crate::error::{display_name, ImportError, Result, RomportError};
use sevenz_rust2::Error as SevenZError;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of expanding the archives in a batch.
#[derive(Debug, Default)]
pub struct ExpandOutcome {
    /// Non-archive inputs in input order, followed by extracted files.
    pub paths: Vec<PathBuf>,
    pub errors: Vec<ImportError>,
}

/// Why a single archive produced nothing.
#[derive(Debug)]
pub(crate) enum ExtractFailure {
    Encrypted,
    Failed(String),
}

impl From<io::Error> for ExtractFailure {
    fn from(err: io::Error) -> Self {
        ExtractFailure::Failed(err.to_string())
    }
}

impl From<zip::result::ZipError> for ExtractFailure {
    fn from(err: zip::result::ZipError) -> Self {
        ExtractFailure::Failed(err.to_string())
    }
}

/// Expand every archive in `paths` into `scratch_dir`.
///
/// An archive's entries are kept when the classifier recognises their
/// extension and their file name is not hidden. With `silent` set, archive
/// problems are logged and dropped instead of being returned as errors.
pub fn expand_archives(
    paths: &[PathBuf],
    scratch_dir: &Path,
    registry: &ExtensionRegistry,
    silent: bool,
) -> ExpandOutcome {
    let mut outcome = ExpandOutcome::default();
    let mut extracted = Vec::new();

    for path in paths {
        if !registry.is_archive_path(path) {
            outcome.paths.push(path.clone());
            continue;
        }

        match expand_one(path, scratch_dir, registry) {
            Ok(files) => {
                info!("Extracted {} file(s) from {}", files.len(), path.display());
                extracted.extend(files);
            }
            Err(error) => {
                if silent {
                    warn!("Skipping archive {}: {}", path.display(), error);
                } else {
                    outcome.errors.push(error);
                }
            }
        }
    }

    outcome.paths.extend(extracted);
    outcome
}

/// [`expand_archives`] on the blocking pool.
pub async fn expand_archives_async(
    paths: Vec<PathBuf>,
    scratch_dir: PathBuf,
    registry: ExtensionRegistry,
    silent: bool,
) -> Result<ExpandOutcome> {
    tokio::task::spawn_blocking(move || expand_archives(&paths, &scratch_dir, &registry, silent))
        .await
        .map_err(|e| RomportError::Other(format!("Archive expansion task failed: {}", e)))
}

fn expand_one(
    archive: &Path,
    scratch_dir: &Path,
    registry: &ExtensionRegistry,
) -> std::result::Result<Vec<PathBuf>, ImportError> {
    let file_name = display_name(archive);
    let dest = scratch_dir.join(&file_name);

    if dest.exists() {
        remove_path(&dest).map_err(|e| ImportError::ArchiveExtractFailed {
            file_name: file_name.clone(),
            reason: e.to_string(),
        })?;
    }

    let keep = |entry: &Path| is_importable_entry(entry, registry);
    let result = match extension_of(archive).as_str() {
        "7z" => extract_7z(archive, &dest, keep),
        _ => extract_zip(archive, &dest, |entry| {
            keep(entry).then(|| entry.to_path_buf())
        }),
    };

    match result {
        Ok(files) if files.is_empty() => {
            let _ = fs::remove_dir_all(&dest);
            Err(ImportError::ArchiveNothingSupported { file_name })
        }
        Ok(files) => Ok(files),
        Err(failure) => {
            let _ = fs::remove_dir_all(&dest);
            Err(match failure {
                ExtractFailure::Encrypted => ImportError::ArchiveEncrypted { file_name },
                ExtractFailure::Failed(reason) => {
                    ImportError::ArchiveExtractFailed { file_name, reason }
                }
            })
        }
    }
}

fn is_importable_entry(entry: &Path, registry: &ExtensionRegistry) -> bool {
    let hidden = entry.components().any(|c| match c {
        Component::Normal(part) => {
            let part = part.to_string_lossy();
            part.starts_with('.') || part == "__MACOSX"
        }
        _ => false,
    });
    !hidden && registry.is_recognized(&extension_of(entry))
}

/// Extract the file entries of a zip archive into `dest`.
///
/// `map_entry` receives each file entry's enclosed path and returns where it
/// should land relative to `dest`, or `None` to skip it. Any encrypted entry
/// rejects the whole archive.
pub(crate) fn extract_zip<F>(
    archive_path: &Path,
    dest: &Path,
    mut map_entry: F,
) -> std::result::Result<Vec<PathBuf>, ExtractFailure>
where
    F: FnMut(&Path) -> Option<PathBuf>,
{
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    for i in 0..archive.len() {
        if archive.by_index_raw(i)?.encrypted() {
            return Err(ExtractFailure::Encrypted);
        }
    }

    let mut extracted = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let Some(enclosed) = entry.enclosed_name() else {
            debug!("Skipping unsafe zip entry {}", entry.name());
            continue;
        };
        let Some(relative) = map_entry(&enclosed) else {
            continue;
        };
        let Some(out_path) = sanitize_extract_path(dest, &relative) else {
            continue;
        };

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
        extracted.push(out_path);
    }

    Ok(extracted)
}

fn extract_7z<F>(
    archive_path: &Path,
    dest: &Path,
    keep: F,
) -> std::result::Result<Vec<PathBuf>, ExtractFailure>
where
    F: Fn(&Path) -> bool,
{
    let file = File::open(archive_path)?;
    let mut extracted = Vec::new();
    let mut write_error: Option<String> = None;

    let result = sevenz_rust2::decompress_with_extract_fn(file, dest, |entry, reader, _| {
        if entry.is_directory {
            return Ok(true);
        }
        let relative = PathBuf::from(&entry.name);
        if !keep(&relative) {
            return Ok(true);
        }
        let Some(out_path) = sanitize_extract_path(dest, &relative) else {
            debug!("Skipping unsafe 7z entry {}", entry.name);
            return Ok(true);
        };

        match write_entry(reader, &out_path) {
            Ok(()) => {
                extracted.push(out_path);
                Ok(true)
            }
            Err(e) => {
                write_error = Some(format!("{}: {}", entry.name, e));
                Ok(false)
            }
        }
    });

    match result {
        Err(SevenZError::PasswordRequired) | Err(SevenZError::MaybeBadPassword(_)) => {
            Err(ExtractFailure::Encrypted)
        }
        Err(e) => Err(ExtractFailure::Failed(e.to_string())),
        Ok(()) => match write_error {
            Some(reason) => Err(ExtractFailure::Failed(reason)),
            None => Ok(extracted),
        },
    }
}

fn write_entry(reader: &mut dyn Read, out_path: &Path) -> io::Result<()> {
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = File::create(out_path)?;
    io::copy(reader, &mut out)?;
    Ok(())
}

/// Join `raw_path` under `dest_root`, rejecting absolute paths and `..`.
pub(crate) fn sanitize_extract_path(dest_root: &Path, raw_path: &Path) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for comp in raw_path.components() {
        match comp {
            Component::Normal(v) => clean.push(v),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        return None;
    }
    Some(dest_root.join(clean))
}

fn remove_path(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::AesMode;

    /// Write a zip at `path` with the given `(name, contents)` entries.
    pub(crate) fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, contents) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(contents).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_non_archives_pass_through_first() {
        let dir = TempDir::new().unwrap();
        let scratch = dir.path().join("scratch");
        let pack = dir.path().join("pack.zip");
        write_zip(&pack, &[("inner.gba", b"rom")]);
        let loose = dir.path().join("loose.nds");
        fs::write(&loose, b"rom").unwrap();

        let outcome = expand_archives(
            &[pack, loose.clone()],
            &scratch,
            &ExtensionRegistry::default(),
            false,
        );

        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.paths.len(), 2);
        assert_eq!(outcome.paths[0], loose);
        assert_eq!(outcome.paths[1].file_name().unwrap(), "inner.gba");
        assert!(outcome.paths[1].starts_with(&scratch));
    }

    #[test]
    fn test_unsupported_and_hidden_entries_are_skipped() {
        let dir = TempDir::new().unwrap();
        let pack = dir.path().join("pack.zip");
        write_zip(
            &pack,
            &[
                ("readme.txt", b"hello"),
                (".hidden.gba", b"rom"),
                ("__MACOSX/game.gba", b"meta"),
                ("disc/game.cue", b"FILE \"game.bin\" BINARY"),
            ],
        );

        let outcome = expand_archives(
            &[pack],
            &dir.path().join("scratch"),
            &ExtensionRegistry::default(),
            false,
        );

        assert_eq!(outcome.paths.len(), 1);
        assert_eq!(outcome.paths[0].file_name().unwrap(), "game.cue");
    }

    #[test]
    fn test_nothing_supported() {
        let dir = TempDir::new().unwrap();
        let pack = dir.path().join("docs.zip");
        write_zip(&pack, &[("readme.txt", b"hello")]);

        let outcome = expand_archives(
            &[pack],
            &dir.path().join("scratch"),
            &ExtensionRegistry::default(),
            false,
        );

        assert!(outcome.paths.is_empty());
        assert!(matches!(
            outcome.errors.as_slice(),
            [ImportError::ArchiveNothingSupported { file_name }] if file_name == "docs.zip"
        ));
    }

    #[test]
    fn test_corrupt_archives_fail() {
        let dir = TempDir::new().unwrap();
        let zip_path = dir.path().join("broken.zip");
        let sevenz_path = dir.path().join("broken.7z");
        fs::write(&zip_path, b"definitely not a zip").unwrap();
        fs::write(&sevenz_path, b"definitely not a 7z").unwrap();

        let outcome = expand_archives(
            &[zip_path, sevenz_path],
            &dir.path().join("scratch"),
            &ExtensionRegistry::default(),
            false,
        );

        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome
            .errors
            .iter()
            .all(|e| matches!(e, ImportError::ArchiveExtractFailed { .. })));
    }

    #[test]
    fn test_encrypted_zip_is_rejected() {
        let dir = TempDir::new().unwrap();
        let pack = dir.path().join("locked.zip");
        let mut zip = zip::ZipWriter::new(File::create(&pack).unwrap());
        zip.start_file("plain.gba", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"open").unwrap();
        let locked = SimpleFileOptions::default().with_aes_encryption(AesMode::Aes256, "secret");
        zip.start_file("locked.gba", locked).unwrap();
        zip.write_all(b"hidden").unwrap();
        zip.finish().unwrap();
        let scratch = dir.path().join("scratch");

        let outcome = expand_archives(&[pack], &scratch, &ExtensionRegistry::default(), false);

        assert!(outcome.paths.is_empty());
        assert!(matches!(
            outcome.errors.as_slice(),
            [ImportError::ArchiveEncrypted { file_name }] if file_name == "locked.zip"
        ));
        assert!(!scratch.join("locked.zip").exists());
    }

    #[test]
    fn test_7z_entries_are_extracted() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source");
        fs::create_dir_all(source.join("disc")).unwrap();
        fs::write(source.join("Wario Land.gb"), b"wario").unwrap();
        fs::write(source.join("disc/Panzer.cue"), b"FILE \"Panzer.bin\" BINARY").unwrap();
        fs::write(source.join("notes.txt"), b"skip me").unwrap();
        let pack = dir.path().join("bundle.7z");
        sevenz_rust2::compress_to_path(&source, &pack).unwrap();

        let outcome = expand_archives(
            &[pack],
            &dir.path().join("scratch"),
            &ExtensionRegistry::default(),
            false,
        );

        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        let mut names: Vec<String> = outcome
            .paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, ["Panzer.cue", "Wario Land.gb"]);
        let wario = outcome
            .paths
            .iter()
            .find(|p| p.ends_with("Wario Land.gb"))
            .unwrap();
        assert_eq!(fs::read(wario).unwrap(), b"wario");
    }

    #[test]
    fn test_silent_suppresses_errors() {
        let dir = TempDir::new().unwrap();
        let pack = dir.path().join("docs.zip");
        write_zip(&pack, &[("readme.txt", b"hello")]);

        let outcome = expand_archives(
            &[pack],
            &dir.path().join("scratch"),
            &ExtensionRegistry::default(),
            true,
        );

        assert!(outcome.errors.is_empty());
        assert!(outcome.paths.is_empty());
    }

    #[test]
    fn test_existing_destination_is_replaced() {
        let dir = TempDir::new().unwrap();
        let scratch = dir.path().join("scratch");
        let stale = scratch.join("pack.zip").join("stale.gba");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, b"old").unwrap();

        let pack = dir.path().join("pack.zip");
        write_zip(&pack, &[("fresh.gba", b"new")]);

        let outcome = expand_archives(&[pack], &scratch, &ExtensionRegistry::default(), false);

        assert_eq!(outcome.paths.len(), 1);
        assert!(!stale.exists());
        assert_eq!(fs::read(&outcome.paths[0]).unwrap(), b"new");
    }

    #[test]
    fn test_sanitize_extract_path() {
        let root = Path::new("/scratch");
        assert_eq!(
            sanitize_extract_path(root, Path::new("a/./b.gba")),
            Some(PathBuf::from("/scratch/a/b.gba"))
        );
        assert!(sanitize_extract_path(root, Path::new("../escape.gba")).is_none());
        assert!(sanitize_extract_path(root, Path::new("/etc/passwd")).is_none());
        assert!(sanitize_extract_path(root, Path::new("")).is_none());
    }
}
