//! M3U playlist resolution.

use super::{file_name_of, reference_name, DescriptorResolution, MultiFileRom};
use crate::classify::extension_of;
use crate::error::{display_name, ImportError};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::debug;

/// Output of the playlist pass.
#[derive(Debug, Default)]
pub struct PlaylistResolution {
    /// Single-file candidates left after grouping.
    pub plain: Vec<PathBuf>,
    /// Surviving cue/gdi groups followed by playlist groups.
    pub groups: Vec<MultiFileRom>,
    pub errors: Vec<ImportError>,
}

/// Entries of an m3u playlist. Blank lines and `#` directives are skipped.
pub fn parse_m3u(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

enum Entry {
    Group(usize),
    Plain(usize),
}

/// Fold descriptor groups and plain files into the playlists that name them.
///
/// An entry naming a cue/gdi descriptor absorbs that whole group; any other
/// entry must name a plain candidate. When an entry resolves to nothing, the
/// playlist and everything it named are dropped and one `MissingFile` error
/// is reported.
pub fn resolve_playlists(resolution: DescriptorResolution) -> PlaylistResolution {
    let DescriptorResolution {
        plain,
        groups,
        mut errors,
    } = resolution;

    let mut excluded_plain: HashSet<usize> = HashSet::new();
    let mut excluded_groups: HashSet<usize> = HashSet::new();
    let mut playlist_groups = Vec::new();

    for (index, path) in plain.iter().enumerate() {
        if extension_of(path) != "m3u" {
            continue;
        }
        excluded_plain.insert(index);
        let file_name = display_name(path);

        let content = match std::fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                debug!("Failed to read playlist {}: {}", path.display(), e);
                errors.push(ImportError::BadFile { file_name });
                continue;
            }
        };

        let references: Vec<String> = parse_m3u(&content)
            .iter()
            .map(|r| reference_name(r))
            .filter(|r| !r.is_empty())
            .collect();
        if references.is_empty() {
            errors.push(ImportError::BadMultiFileDescriptor { file_name });
            continue;
        }

        let mut entries = Vec::with_capacity(references.len());
        let mut missing = None;
        for reference in &references {
            let group = groups.iter().enumerate().position(|(i, g)| {
                !excluded_groups.contains(&i) && g.descriptor_name() == *reference
            });
            let single = plain.iter().enumerate().position(|(i, p)| {
                i != index && !excluded_plain.contains(&i) && file_name_of(p) == *reference
            });

            match (group, single) {
                (Some(g), _) => entries.push(Entry::Group(g)),
                (None, Some(p)) => entries.push(Entry::Plain(p)),
                (None, None) => {
                    if missing.is_none() {
                        missing = Some(reference.clone());
                    }
                }
            }
        }

        for entry in &entries {
            match entry {
                Entry::Group(g) => excluded_groups.insert(*g),
                Entry::Plain(p) => excluded_plain.insert(*p),
            };
        }

        if let Some(missing) = missing {
            errors.push(ImportError::MissingFile {
                playlist: file_name,
                missing,
            });
            continue;
        }

        let mut members = Vec::new();
        for entry in entries {
            match entry {
                Entry::Group(g) => members.extend(groups[g].all_files().cloned()),
                Entry::Plain(p) => members.push(plain[p].clone()),
            }
        }
        playlist_groups.push(MultiFileRom {
            descriptor: path.clone(),
            members,
        });
    }

    let mut result = PlaylistResolution {
        errors,
        ..Default::default()
    };
    result.plain = plain
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !excluded_plain.contains(i))
        .map(|(_, p)| p)
        .collect();
    result.groups = groups
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !excluded_groups.contains(i))
        .map(|(_, g)| g)
        .collect();
    result.groups.extend(playlist_groups);
    result
}
