use codeflow::watcher::{SourceEvent, SourceWatcher};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

#[tokio::test]
async fn test_write_to_watched_file_emits_change() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");
    let path = temp_dir.path().join("snippet.py");
    std::fs::write(&path, "x = 1\n").expect("Failed to write source file");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let watcher = SourceWatcher::new(&path, tx).expect("Failed to start watcher");
    // Let the backend register before the first write
    tokio::time::sleep(Duration::from_millis(100)).await;

    std::fs::write(&path, "x = 2\n").expect("Failed to rewrite source file");

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no event within five seconds")
        .expect("watcher channel closed");
    assert_eq!(event, SourceEvent::Changed(watcher.path().to_path_buf()));
}

#[tokio::test]
async fn test_sibling_files_are_ignored() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");
    let path = temp_dir.path().join("watched.rs");
    std::fs::write(&path, "fn main() {}\n").expect("Failed to write source file");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _watcher = SourceWatcher::new(&path, tx).expect("Failed to start watcher");
    tokio::time::sleep(Duration::from_millis(100)).await;

    std::fs::write(temp_dir.path().join("other.rs"), "// noise\n")
        .expect("Failed to write sibling file");

    let outcome = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
    assert!(outcome.is_err(), "unexpected event: {outcome:?}");
}
