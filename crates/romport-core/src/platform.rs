//! Emulated platforms and extension-based platform inference.

use serde::{Deserialize, Serialize};

/// Extensions used by more than one platform. A ROM with one of these
/// imports as [`Platform::Unknown`] and is assigned a platform later.
pub const AMBIGUOUS_ROM_EXTENSIONS: &[&str] = &["chd", "iso", "bin", "cue", "m3u"];

/// A platform a game can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Gb,
    Gbc,
    Gba,
    Nds,
    #[serde(rename = "3ds")]
    N3ds,
    Nes,
    Snes,
    N64,
    Psp,
    Ps1,
    Md,
    Mcd,
    #[serde(rename = "32x")]
    S32x,
    Sg1000,
    Gg,
    Ms,
    Ss,
    Dc,
    Unknown,
}

impl Platform {
    pub const ALL: &'static [Platform] = &[
        Platform::Gb,
        Platform::Gbc,
        Platform::Gba,
        Platform::Nds,
        Platform::N3ds,
        Platform::Nes,
        Platform::Snes,
        Platform::N64,
        Platform::Psp,
        Platform::Ps1,
        Platform::Md,
        Platform::Mcd,
        Platform::S32x,
        Platform::Sg1000,
        Platform::Gg,
        Platform::Ms,
        Platform::Ss,
        Platform::Dc,
        Platform::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Gb => "gb",
            Platform::Gbc => "gbc",
            Platform::Gba => "gba",
            Platform::Nds => "nds",
            Platform::N3ds => "3ds",
            Platform::Nes => "nes",
            Platform::Snes => "snes",
            Platform::N64 => "n64",
            Platform::Psp => "psp",
            Platform::Ps1 => "ps1",
            Platform::Md => "md",
            Platform::Mcd => "mcd",
            Platform::S32x => "32x",
            Platform::Sg1000 => "sg1000",
            Platform::Gg => "gg",
            Platform::Ms => "ms",
            Platform::Ss => "ss",
            Platform::Dc => "dc",
            Platform::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.to_lowercase();
        Self::ALL.iter().copied().find(|p| p.as_str() == s)
    }

    /// Infer the platform from a ROM extension.
    ///
    /// Returns `None` for extensions no platform accepts, and
    /// `Some(Platform::Unknown)` for extensions shared by several platforms.
    pub fn from_rom_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_lowercase();
        if AMBIGUOUS_ROM_EXTENSIONS.contains(&ext.as_str()) {
            return Some(Platform::Unknown);
        }
        let platform = match ext.as_str() {
            "gb" => Platform::Gb,
            "gbc" => Platform::Gbc,
            "gba" => Platform::Gba,
            "ds" | "nds" => Platform::Nds,
            "3ds" | "cia" | "app" | "cci" | "cxi" | "3dsx" => Platform::N3ds,
            "nes" | "fc" => Platform::Nes,
            "smc" | "sfc" | "fig" | "snes" => Platform::Snes,
            "n64" | "v64" | "z64" => Platform::N64,
            "elf" | "cso" | "prx" | "pbp" => Platform::Psp,
            "md" | "gen" | "smd" => Platform::Md,
            "mcd" => Platform::Mcd,
            "32x" => Platform::S32x,
            "sg" => Platform::Sg1000,
            "gg" => Platform::Gg,
            "sms" | "bms" => Platform::Ms,
            "ccd" => Platform::Ss,
            "gdi" => Platform::Dc,
            _ => return None,
        };
        Some(platform)
    }

    /// Platform implied by a save file extension, if any.
    pub fn from_save_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "dsv" => Some(Platform::Nds),
            "bkr" => Some(Platform::Ss),
            _ => None,
        }
    }

    /// Extension of the save file a game on this platform keeps.
    pub fn save_extension(&self) -> &'static str {
        match self {
            Platform::Nds => "dsv",
            Platform::Ss => "bkr",
            Platform::Ps1 | Platform::Snes | Platform::Nes => "srm",
            _ => "sav",
        }
    }

    /// System directory name on the libretro thumbnail server.
    pub fn thumbnail_system(&self) -> Option<&'static str> {
        let name = match self {
            Platform::Gb => "Nintendo - Game Boy",
            Platform::Gbc => "Nintendo - Game Boy Color",
            Platform::Gba => "Nintendo - Game Boy Advance",
            Platform::Nds => "Nintendo - Nintendo DS",
            Platform::N3ds => "Nintendo - Nintendo 3DS",
            Platform::Nes => "Nintendo - Nintendo Entertainment System",
            Platform::Snes => "Nintendo - Super Nintendo Entertainment System",
            Platform::N64 => "Nintendo - Nintendo 64",
            Platform::Psp => "Sony - PlayStation Portable",
            Platform::Ps1 => "Sony - PlayStation",
            Platform::Md => "Sega - Mega Drive - Genesis",
            Platform::Mcd => "Sega - Mega-CD - Sega CD",
            Platform::S32x => "Sega - 32X",
            Platform::Sg1000 => "Sega - SG-1000",
            Platform::Gg => "Sega - Game Gear",
            Platform::Ms => "Sega - Master System - Mark III",
            Platform::Ss => "Sega - Saturn",
            Platform::Dc => "Sega - Dreamcast",
            Platform::Unknown => return None,
        };
        Some(name)
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform::Unknown
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
