//! Non-interactive answers to save resolution prompts.

use async_trait::async_trait;
use romport::{GameRecord, ImportResolver};
use std::path::Path;
use tracing::info;

/// Answers save prompts from command-line flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct SavePolicy {
    pub overwrite_saves: bool,
    pub pick_first_match: bool,
}

#[async_trait]
impl ImportResolver for SavePolicy {
    async fn choose_game_for_save(&self, save: &Path, candidates: &[GameRecord]) -> Option<String> {
        if !self.pick_first_match {
            info!(
                "Skipping {} ({} candidate game(s)); pass --pick-first-match to assign it",
                save.display(),
                candidates.len()
            );
            return None;
        }
        let game = candidates.first()?;
        info!("Assigning {} to {}", save.display(), game.name);
        Some(game.id.clone())
    }

    async fn confirm_save_overwrite(&self, save: &Path, target: &str) -> bool {
        if !self.overwrite_saves {
            info!(
                "Keeping existing save of {}; pass --overwrite-saves to replace it with {}",
                target,
                save.display()
            );
        }
        self.overwrite_saves
    }
}
