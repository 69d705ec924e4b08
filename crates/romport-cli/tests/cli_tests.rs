//! Integration tests for the romport binary.

use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn romport(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_romport"))
        .arg("--root")
        .arg(root)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to run romport")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_import_then_list_games() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("library");
    let rom = temp_dir.path().join("Golden Sun.gba");
    std::fs::write(&rom, b"golden sun").unwrap();

    let output = romport(&root, &["import", "--no-covers", rom.to_str().unwrap()]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("Golden Sun"));

    let output = romport(&root, &["games", "--json"]);
    assert!(output.status.success());
    let games: Value = serde_json::from_str(&stdout(&output)).unwrap();
    let games = games.as_array().unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0]["name"], "Golden Sun");
    assert_eq!(games[0]["platform"], "gba");
}

#[test]
fn test_reimport_reports_problem() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("library");
    let rom = temp_dir.path().join("Tetris.gb");
    std::fs::write(&rom, b"tetris").unwrap();
    let rom = rom.to_str().unwrap();

    assert!(romport(&root, &["import", "--no-covers", rom]).status.success());
    let output = romport(&root, &["import", "--no-covers", rom]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("Tetris.gb has already been imported"));
}

#[test]
fn test_sync_to_folder() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("library");
    let remote = temp_dir.path().join("cloud");
    let rom = temp_dir.path().join("Pong.nes");
    std::fs::write(&rom, b"pong").unwrap();
    assert!(romport(&root, &["import", "--no-covers", rom.to_str().unwrap()])
        .status
        .success());

    let output = romport(&root, &["sync", "--remote", remote.to_str().unwrap()]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("Uploaded 1"));

    let output = romport(&root, &["sync", "--remote", remote.to_str().unwrap()]);
    assert!(stdout(&output).contains("Uploaded 0, downloaded 0"));
}

#[test]
fn test_empty_skin_list() {
    let temp_dir = TempDir::new().unwrap();
    let output = romport(&temp_dir.path().join("library"), &["skins", "--json"]);
    assert!(output.status.success());
    let skins: Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(skins, Value::Array(Vec::new()));
}
