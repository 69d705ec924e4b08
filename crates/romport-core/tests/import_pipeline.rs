//! Integration tests for the import pipeline through the public `Romport`
//! interface.

use async_trait::async_trait;
use romport::{
    content_identity, resolve_sequentially, CoverArtProvider, GameRecord, ImportError,
    ImportOptions, ImportResolver, Platform, Romport,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

async fn create_library(temp_dir: &TempDir) -> Romport {
    Romport::builder(temp_dir.path().join("library"))
        .auto_create_dirs(true)
        .with_cover_lookups(false)
        .build()
        .await
        .expect("Failed to open library")
}

fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path
}

fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let mut zip = zip::ZipWriter::new(fs::File::create(path).unwrap());
    for (name, contents) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(contents).unwrap();
    }
    zip.finish().unwrap();
}

/// Picks a fixed candidate index and records every prompt it sees.
struct ScriptedResolver {
    pick: usize,
    overwrite: bool,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedResolver {
    fn new(pick: usize, overwrite: bool) -> Self {
        Self {
            pick,
            overwrite,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ImportResolver for ScriptedResolver {
    async fn choose_game_for_save(&self, save: &Path, candidates: &[GameRecord]) -> Option<String> {
        self.prompts
            .lock()
            .unwrap()
            .push(format!("choose {}", save.file_name()?.to_string_lossy()));
        candidates.get(self.pick).map(|g| g.id.clone())
    }

    async fn confirm_save_overwrite(&self, _save: &Path, target: &str) -> bool {
        self.prompts
            .lock()
            .unwrap()
            .push(format!("overwrite {}", target));
        self.overwrite
    }
}

#[tokio::test]
async fn test_scenario_a_cue_group_and_standalone_candidate() {
    let temp_dir = TempDir::new().unwrap();
    let library = create_library(&temp_dir).await;
    let input = temp_dir.path().join("input");
    let cue = write_file(&input, "game.cue", b"FILE \"game.bin\" BINARY\n  TRACK 01 MODE1/2352\n");
    let bin = write_file(&input, "game.bin", b"track data");
    let extra = write_file(&input, "game.iso_extra", b"extra");

    let report = library
        .import_files(vec![cue, bin, extra.clone()], ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(report.games.len(), 1);
    let game = &report.games[0];
    assert_eq!(game.rom_file, "game.cue");
    let rom_dir = library.layout().rom_dir(&game.id);
    assert!(rom_dir.join("game.cue").exists());
    assert!(rom_dir.join("game.bin").exists());

    // The extra file was classified on its own and rejected by extension.
    assert!(matches!(
        report.errors.as_slice(),
        [ImportError::PermissionDenied { path }] if *path == extra
    ));
}

#[tokio::test]
async fn test_scenario_b_playlist_with_missing_disc() {
    let temp_dir = TempDir::new().unwrap();
    let library = create_library(&temp_dir).await;
    let input = temp_dir.path().join("input");
    let m3u = write_file(&input, "set.m3u", b"disc1.cue\ndisc2.cue\n");
    let cue = write_file(&input, "disc1.cue", b"FILE \"disc1.bin\" BINARY\n");
    let bin = write_file(&input, "disc1.bin", b"disc one");

    let report = library
        .import_files(vec![m3u, cue, bin], ImportOptions::default())
        .await
        .unwrap();

    assert!(report.games.is_empty());
    assert!(matches!(
        report.errors.as_slice(),
        [ImportError::MissingFile { playlist, missing }]
            if playlist == "set.m3u" && missing == "disc2.cue"
    ));
    assert!(library.list_games().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_scenario_c_reimport_is_deduplicated() {
    let temp_dir = TempDir::new().unwrap();
    let library = create_library(&temp_dir).await;
    let rom = write_file(&temp_dir.path().join("input"), "Mother 3.gba", b"mother three");

    let first = library
        .import_files(vec![rom.clone()], ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(first.games.len(), 1);
    assert!(first.errors.is_empty());
    let rom_path = library.layout().rom_path(&first.games[0]);
    let copied_at = fs::metadata(&rom_path).unwrap().modified().unwrap();

    let second = library
        .import_files(vec![rom], ImportOptions::default())
        .await
        .unwrap();
    assert!(second.games.is_empty());
    assert!(matches!(
        second.errors.as_slice(),
        [ImportError::FileAlreadyExists { file_name }] if file_name == "Mother 3.gba"
    ));
    assert_eq!(fs::metadata(&rom_path).unwrap().modified().unwrap(), copied_at);
    assert_eq!(library.list_games().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_scenario_d_ambiguous_save_is_disambiguated() {
    let temp_dir = TempDir::new().unwrap();
    let library = create_library(&temp_dir).await;
    let input = temp_dir.path().join("input");
    let gb = write_file(&input, "Tetris.gb", b"gameboy tetris");
    let nes = write_file(&input, "Tetris.nes", b"nes tetris");
    library
        .import_files(vec![gb, nes], ImportOptions::default())
        .await
        .unwrap();

    let save = write_file(&input, "saves/Tetris.sav", b"battery");
    let report = library
        .import_files(vec![save.clone()], ImportOptions::default())
        .await
        .unwrap();
    let candidates = match report.errors.as_slice() {
        [ImportError::SaveAmbiguousMatch { candidates, .. }] => candidates.clone(),
        other => panic!("unexpected errors: {:?}", other),
    };
    assert_eq!(candidates.len(), 2);

    let resolver = ScriptedResolver::new(1, true);
    let outcome = library
        .resolve_save_errors(report.errors, &resolver)
        .await
        .unwrap();

    assert!(outcome.unhandled.is_empty());
    assert_eq!(outcome.resolved, vec![Some("Tetris".to_string())]);
    let chosen = &candidates[1];
    let other = &candidates[0];
    assert_eq!(
        fs::read(library.layout().save_path(chosen)).unwrap(),
        b"battery"
    );
    assert!(!library.layout().save_path(other).exists());
    assert_eq!(*resolver.prompts.lock().unwrap(), vec!["choose Tetris.sav"]);
}

#[tokio::test]
async fn test_existing_save_needs_confirmation() {
    let temp_dir = TempDir::new().unwrap();
    let library = create_library(&temp_dir).await;
    let input = temp_dir.path().join("input");
    let rom = write_file(&input, "Zelda.gba", b"zelda");
    library
        .import_files(vec![rom], ImportOptions::default())
        .await
        .unwrap();

    let first = write_file(&input, "a/Zelda.sav", b"first");
    let summary = library
        .import_and_resolve(vec![first], ImportOptions::default(), &ScriptedResolver::new(0, false))
        .await
        .unwrap();
    assert_eq!(summary.saves, vec!["Zelda"]);
    assert!(summary.message.is_none());

    let second = write_file(&input, "b/Zelda.sav", b"second");
    let declined = library
        .import_and_resolve(vec![second.clone()], ImportOptions::default(), &ScriptedResolver::new(0, false))
        .await
        .unwrap();
    assert!(declined.saves.is_empty());
    assert!(declined.errors.is_empty());

    let games = library.list_games().await.unwrap();
    let save_path = library.layout().save_path(&games[0]);
    assert_eq!(fs::read(&save_path).unwrap(), b"first");

    let accepted = library
        .import_and_resolve(vec![second], ImportOptions::default(), &ScriptedResolver::new(0, true))
        .await
        .unwrap();
    assert_eq!(accepted.saves, vec!["Zelda"]);
    assert_eq!(fs::read(&save_path).unwrap(), b"second");
}

#[tokio::test]
async fn test_save_errors_are_reported_when_library_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    let library = create_library(&temp_dir).await;
    let save = write_file(&temp_dir.path().join("input"), "Orphan.srm", b"s");
    let resolver = ScriptedResolver::new(0, true);

    let summary = library
        .import_and_resolve(vec![save], ImportOptions::default(), &resolver)
        .await
        .unwrap();

    assert!(matches!(
        summary.errors.as_slice(),
        [ImportError::SaveNoMatchingGame { .. }]
    ));
    assert!(summary.message.unwrap().contains("Orphan.srm"));
    assert!(resolver.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_silent_import_skips_resolution() {
    let temp_dir = TempDir::new().unwrap();
    let library = create_library(&temp_dir).await;
    let input = temp_dir.path().join("input");
    library
        .import_files(vec![write_file(&input, "Tetris.gb", b"gb")], ImportOptions::default())
        .await
        .unwrap();
    let resolver = ScriptedResolver::new(0, true);

    let summary = library
        .import_and_resolve(
            vec![write_file(&input, "Unknown.srm", b"s")],
            ImportOptions { silent: true },
            &resolver,
        )
        .await
        .unwrap();

    assert_eq!(summary.errors.len(), 1);
    assert!(resolver.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_playlist_absorbs_cue_groups() {
    let temp_dir = TempDir::new().unwrap();
    let library = create_library(&temp_dir).await;
    let input = temp_dir.path().join("input");
    let paths = vec![
        write_file(&input, "FF7.m3u", b"FF7 (Disc 1).cue\nFF7 (Disc 2).cue\n"),
        write_file(&input, "FF7 (Disc 1).cue", b"FILE \"FF7 (Disc 1).bin\" BINARY\n"),
        write_file(&input, "FF7 (Disc 1).bin", b"disc one"),
        write_file(&input, "FF7 (Disc 2).cue", b"FILE \"FF7 (Disc 2).bin\" BINARY\n"),
        write_file(&input, "FF7 (Disc 2).bin", b"disc two"),
    ];

    let report = library
        .import_files(paths, ImportOptions::default())
        .await
        .unwrap();

    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.games.len(), 1);
    let game = &report.games[0];
    assert_eq!(game.name, "FF7");
    assert_eq!(game.rom_file, "FF7.m3u");
    assert_eq!(game.platform, Platform::Unknown);
    let copied = fs::read_dir(library.layout().rom_dir(&game.id)).unwrap().count();
    assert_eq!(copied, 5);
}

#[tokio::test]
async fn test_archives_are_expanded_and_imported() {
    let temp_dir = TempDir::new().unwrap();
    let library = create_library(&temp_dir).await;
    let input = temp_dir.path().join("input");
    fs::create_dir_all(&input).unwrap();
    let archive = input.join("collection.zip");
    write_zip(
        &archive,
        &[
            ("Kirby.gba", b"kirby rom"),
            ("readme.txt", b"ignored"),
            ("__MACOSX/._Kirby.gba", b"resource fork"),
        ],
    );
    let loose = write_file(&input, "Pong.nes", b"pong");

    let report = library
        .import_files(vec![archive, loose], ImportOptions::default())
        .await
        .unwrap();

    assert!(report.errors.is_empty(), "{:?}", report.errors);
    let mut names: Vec<_> = report.games.iter().map(|g| g.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["Kirby", "Pong"]);
}

#[tokio::test]
async fn test_copy_failure_leaves_no_record() {
    let temp_dir = TempDir::new().unwrap();
    let library = create_library(&temp_dir).await;
    let rom = write_file(&temp_dir.path().join("input"), "Doomed.gba", b"doomed");
    let roms_dir = library.layout().roms_dir();
    fs::remove_dir_all(&roms_dir).unwrap();
    fs::write(&roms_dir, b"blocking file").unwrap();

    let report = library
        .import_files(vec![rom.clone()], ImportOptions::default())
        .await
        .unwrap();

    assert!(matches!(
        report.errors.as_slice(),
        [ImportError::BadCopy { .. }]
    ));
    let hash = content_identity(&rom).unwrap();
    assert!(library.store().find_game(&hash).unwrap().is_none());
}

#[tokio::test]
async fn test_resolution_accounts_for_every_error() {
    let errors = vec![
        ImportError::EmptyInput,
        ImportError::SaveNoMatchingGame {
            save: PathBuf::from("a.sav"),
        },
        ImportError::BadFile {
            file_name: "b.gba".into(),
        },
        ImportError::SaveBundleAlreadyExists {
            bundle: PathBuf::from("c.3ds.sav"),
        },
    ];
    let total = errors.len();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let outcome = resolve_sequentially(
        errors,
        ImportError::is_interactive,
        |error| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push(error.to_string());
            }
        },
    )
    .await;

    assert_eq!(outcome.unhandled.len() + outcome.resolved.len(), total);
    assert_eq!(outcome.unhandled.len(), 2);
    let seen = seen.lock().unwrap();
    assert!(seen[0].contains("a.sav"));
    assert!(seen[1].contains("c.3ds.sav"));
}

struct FixedCover;

#[async_trait]
impl CoverArtProvider for FixedCover {
    async fn find_cover(&self, game: &GameRecord) -> romport::Result<Option<String>> {
        Ok(Some(format!("https://covers.test/{}.png", game.name)))
    }
}

#[tokio::test]
async fn test_new_games_get_covers_in_background() {
    let temp_dir = TempDir::new().unwrap();
    let library = Romport::builder(temp_dir.path().join("library"))
        .auto_create_dirs(true)
        .with_cover_provider(Arc::new(FixedCover))
        .build()
        .await
        .unwrap();
    let rom = write_file(&temp_dir.path().join("input"), "Metroid.gba", b"metroid");

    let report = library
        .import_files(vec![rom], ImportOptions::default())
        .await
        .unwrap();
    let id = report.games[0].id.clone();

    let mut game = None;
    for _ in 0..50 {
        let current = library.store().find_game(&id).unwrap().unwrap();
        if !current.pending_cover_lookup {
            game = Some(current);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let game = game.expect("cover lookup did not finish");
    assert_eq!(
        game.cover_url.as_deref(),
        Some("https://covers.test/Metroid.png")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_batches_keep_their_archives() {
    let temp_dir = TempDir::new().unwrap();
    let library = create_library(&temp_dir).await;

    let mut packs = Vec::new();
    for pack in 0..2 {
        let names: Vec<String> = (0..20).map(|i| format!("Pack{} Game{}.gba", pack, i)).collect();
        let contents: Vec<Vec<u8>> = (0..20)
            .map(|i| format!("pack {} game {}", pack, i).into_bytes())
            .collect();
        let entries: Vec<(&str, &[u8])> = names
            .iter()
            .zip(&contents)
            .map(|(n, c)| (n.as_str(), c.as_slice()))
            .collect();
        let path = temp_dir.path().join(format!("pack{}.zip", pack));
        write_zip(&path, &entries);
        packs.push(path);
    }

    let other = library.clone();
    let (first, second) = tokio::join!(
        library.import_files(vec![packs[0].clone()], ImportOptions::default()),
        other.import_files(vec![packs[1].clone()], ImportOptions::default()),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    assert!(first.errors.is_empty(), "{:?}", first.errors);
    assert!(second.errors.is_empty(), "{:?}", second.errors);
    assert_eq!(first.games.len() + second.games.len(), 40);
    assert_eq!(library.list_games().await.unwrap().len(), 40);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_content_twice_in_one_batch() {
    let temp_dir = TempDir::new().unwrap();
    let library = create_library(&temp_dir).await;
    let contents = vec![0x5au8; 1024 * 1024];
    let a = write_file(temp_dir.path(), "input/a.gba", &contents);
    let b = write_file(temp_dir.path(), "input/b.gba", &contents);

    let report = library
        .import_files(vec![a, b], ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(report.games.len(), 1);
    assert!(matches!(
        report.errors.as_slice(),
        [ImportError::FileAlreadyExists { .. }]
    ));
    let games = library.list_games().await.unwrap();
    assert_eq!(games.len(), 1);
    assert!(library.layout().rom_path(&games[0]).exists());
}
