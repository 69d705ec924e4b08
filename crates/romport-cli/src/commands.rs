//! Subcommand implementations.

use crate::resolvers::SavePolicy;
use anyhow::Result;
use romport::{
    ConflictChoice, FixedConflictPolicy, ImportOptions, ImportSummary, LocalDirCloudStore, Romport,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

async fn open(root: &Path, cover_lookups: bool) -> Result<Romport> {
    let library = Romport::builder(root)
        .auto_create_dirs(true)
        .with_cover_lookups(cover_lookups)
        .build()
        .await?;
    Ok(library)
}

pub async fn import(
    root: &Path,
    paths: Vec<PathBuf>,
    silent: bool,
    policy: SavePolicy,
    cover_lookups: bool,
) -> Result<()> {
    let library = open(root, cover_lookups).await?;
    let summary = library
        .import_and_resolve(paths, ImportOptions { silent }, &policy)
        .await?;
    print_summary(&summary);

    if cover_lookups && !summary.games.is_empty() {
        // Lookups spawned by the import die with the process; settle them.
        let matched = library.match_pending_covers().await?;
        let found = matched.iter().filter(|g| g.cover_url.is_some()).count();
        println!("Covers found: {}/{}", found, matched.len());
    }
    Ok(())
}

fn print_summary(summary: &ImportSummary) {
    for (label, names) in [
        ("Games", &summary.games),
        ("Saves", &summary.saves),
        ("Skins", &summary.skins),
    ] {
        if names.is_empty() {
            continue;
        }
        println!("{} imported: {}", label, names.len());
        for name in names {
            println!("  {}", name);
        }
    }
    if let Some(message) = &summary.message {
        println!("Problems:");
        for line in message.lines() {
            println!("  {}", line);
        }
    }
}

pub async fn sync(root: &Path, remote: PathBuf, prefer: ConflictChoice) -> Result<()> {
    let library = Romport::builder(root)
        .auto_create_dirs(true)
        .with_cover_lookups(false)
        .with_cloud_store(
            Arc::new(LocalDirCloudStore::new(remote)),
            Arc::new(FixedConflictPolicy(prefer)),
        )
        .build()
        .await?;

    let report = library.sync_now().await?;
    println!(
        "Uploaded {}, downloaded {}, unchanged {}, conflicts {}, failed {}",
        report.uploaded, report.downloaded, report.unchanged, report.conflicts, report.failed
    );
    if report.failed > 0 {
        warn!("Some transfers failed; run sync again to retry them");
    }
    Ok(())
}

pub async fn games(root: &Path, json: bool) -> Result<()> {
    let library = open(root, false).await?;
    let games = library.list_games().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&games)?);
        return Ok(());
    }
    for game in games {
        println!(
            "{}  {:<8} {}{}",
            &game.id[..game.id.len().min(12)],
            game.platform.as_str(),
            game.name,
            if game.cover_url.is_some() { "" } else { "  (no cover)" }
        );
    }
    Ok(())
}

pub async fn skins(root: &Path, json: bool) -> Result<()> {
    let library = open(root, false).await?;
    let skins = library.list_skins().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&skins)?);
        return Ok(());
    }
    for skin in skins {
        println!("{:<8} {}  ({})", skin.platform.as_str(), skin.name, skin.identifier);
    }
    Ok(())
}

pub async fn covers(root: &Path) -> Result<()> {
    let library = open(root, true).await?;
    let matched = library.match_pending_covers().await?;
    let found = matched.iter().filter(|g| g.cover_url.is_some()).count();
    println!("Looked up {} game(s), found {} cover(s)", matched.len(), found);
    Ok(())
}
