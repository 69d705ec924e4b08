//! Cue/gdi descriptor resolution.

use super::{file_name_of, reference_name, MultiFileRom};
use crate::classify::extension_of;
use crate::error::{display_name, ImportError};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::debug;

static CUE_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"FILE\s+"([^"]+)""#).expect("cue FILE regex must compile"));

/// Output of the descriptor pass.
#[derive(Debug, Default)]
pub struct DescriptorResolution {
    /// Inputs that are neither a valid descriptor nor one of its members.
    pub plain: Vec<PathBuf>,
    /// Valid cue/gdi sets, in input order.
    pub groups: Vec<MultiFileRom>,
    pub errors: Vec<ImportError>,
}

/// File names referenced by `FILE "..."` lines of a cue sheet.
pub fn parse_cue(content: &str) -> Vec<String> {
    CUE_FILE_RE
        .captures_iter(content)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Track file names of a gdi sheet.
///
/// The first line holds the track count. Every later line with at least two
/// whitespace-separated fields names its file in the second-to-last field.
pub fn parse_gdi(content: &str) -> Vec<String> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            (fields.len() >= 2).then(|| fields[fields.len() - 2].to_string())
        })
        .collect()
}

fn is_descriptor(path: &std::path::Path) -> bool {
    matches!(extension_of(path).as_str(), "cue" | "gdi")
}

/// Group cue/gdi descriptors with the candidates they reference.
///
/// A descriptor is valid only when every referenced file is among
/// `candidates` (matched by file name). An invalid descriptor is excluded
/// together with the referenced files that were present, and reported once
/// with the first missing name.
pub fn resolve_descriptors(candidates: Vec<PathBuf>) -> DescriptorResolution {
    let mut by_name: HashMap<String, &PathBuf> = HashMap::new();
    for path in &candidates {
        by_name.entry(file_name_of(path)).or_insert(path);
    }

    let mut resolution = DescriptorResolution::default();
    let mut excluded: HashSet<PathBuf> = HashSet::new();

    for path in candidates.iter().filter(|p| is_descriptor(p)) {
        let file_name = display_name(path);
        excluded.insert(path.clone());

        let content = match std::fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                debug!("Failed to read descriptor {}: {}", path.display(), e);
                resolution
                    .errors
                    .push(ImportError::BadMultiFileDescriptor { file_name });
                continue;
            }
        };

        let references: Vec<String> = if extension_of(path) == "cue" {
            parse_cue(&content)
        } else {
            parse_gdi(&content)
        }
        .iter()
        .map(|r| reference_name(r))
        .filter(|r| !r.is_empty())
        .collect();

        if references.is_empty() {
            resolution
                .errors
                .push(ImportError::BadMultiFileDescriptor { file_name });
            continue;
        }

        let mut members = Vec::with_capacity(references.len());
        let mut missing = None;
        for reference in &references {
            match by_name.get(reference) {
                Some(member) => members.push((*member).clone()),
                None => {
                    missing = Some(reference.clone());
                    break;
                }
            }
        }

        if let Some(missing) = missing {
            for reference in &references {
                if let Some(member) = by_name.get(reference) {
                    excluded.insert((*member).clone());
                }
            }
            resolution.errors.push(ImportError::MissingSiblingFile {
                descriptor: file_name,
                missing,
            });
            continue;
        }

        excluded.extend(members.iter().cloned());
        resolution.groups.push(MultiFileRom {
            descriptor: path.clone(),
            members,
        });
    }

    resolution.plain = candidates
        .into_iter()
        .filter(|p| !excluded.contains(p))
        .collect();
    resolution
}
