//! Grouping of multi-file ROM sets.
//!
//! Disc images often ship as a descriptor (`.cue`, `.gdi`) plus track files,
//! and multi-disc games add an `.m3u` playlist on top. Resolution runs in two
//! passes: [`resolve_descriptors`] groups cue/gdi sets, then
//! [`resolve_playlists`] folds those groups and loose files into playlists.
//! Either way a set is imported whole or not at all.

mod descriptor;
mod playlist;

pub use descriptor::{parse_cue, parse_gdi, resolve_descriptors, DescriptorResolution};
pub use playlist::{parse_m3u, resolve_playlists, PlaylistResolution};

use std::path::{Path, PathBuf};

/// A descriptor file and the ordered member files it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiFileRom {
    pub descriptor: PathBuf,
    pub members: Vec<PathBuf>,
}

impl MultiFileRom {
    /// Descriptor followed by its members.
    pub fn all_files(&self) -> impl Iterator<Item = &PathBuf> {
        std::iter::once(&self.descriptor).chain(self.members.iter())
    }

    pub fn descriptor_name(&self) -> String {
        file_name_of(&self.descriptor)
    }
}

/// File name component used to match descriptor references against inputs.
pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Final path component of a reference as written inside a descriptor.
pub(crate) fn reference_name(reference: &str) -> String {
    let trimmed = reference.trim().trim_matches('"');
    trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_name() {
        assert_eq!(reference_name("track01.bin"), "track01.bin");
        assert_eq!(reference_name("  disc1/game.cue "), "game.cue");
        assert_eq!(reference_name("\"Game (Track 1).bin\""), "Game (Track 1).bin");
        assert_eq!(reference_name("C:\\roms\\game.bin"), "game.bin");
    }

    #[test]
    fn test_all_files_order() {
        let rom = MultiFileRom {
            descriptor: PathBuf::from("/in/game.cue"),
            members: vec![PathBuf::from("/in/t1.bin"), PathBuf::from("/in/t2.bin")],
        };
        let files: Vec<_> = rom.all_files().cloned().collect();
        assert_eq!(files[0], PathBuf::from("/in/game.cue"));
        assert_eq!(files.len(), 3);
        assert_eq!(rom.descriptor_name(), "game.cue");
    }
}
