// tests/store_file.rs
use std::fs;

use internship_finder::store::JsonFileBackend;
use internship_finder::{PersistenceError, SeenStore};

#[tokio::test]
async fn missing_file_is_a_cold_start() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = SeenStore::new(JsonFileBackend::new(dir.path().join("seen_urls.json")));
    assert!(store.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn commit_writes_a_sorted_json_array_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("seen_urls.json");

    let mut store = SeenStore::new(JsonFileBackend::new(&path));
    store.load().await.unwrap();
    store.stage("https://b.example/2");
    store.stage("https://a.example/1");
    assert_eq!(store.commit().await.unwrap(), 2);

    let on_disk: Vec<String> =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(
        on_disk,
        vec!["https://a.example/1".to_string(), "https://b.example/2".to_string()]
    );
    assert!(!dir.path().join("state").join("seen_urls.json.tmp").exists());

    let mut fresh = SeenStore::new(JsonFileBackend::new(&path));
    let keys = fresh.load().await.unwrap();
    assert_eq!(keys.len(), 2);
    assert!(fresh.contains("https://a.example/1"));
}

#[tokio::test]
async fn legacy_file_is_read_as_is() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seen_urls.json");
    fs::write(&path, r#"["https://remoteok.com/remote-jobs/1", "https://remotive.com/x"]"#).unwrap();

    let mut store = SeenStore::new(JsonFileBackend::new(&path));
    store.load().await.unwrap();
    assert!(store.contains("https://remotive.com/x"));

    store.stage("https://new.example/1");
    store.commit().await.unwrap();
    let on_disk: Vec<String> =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk.len(), 3);
}

#[tokio::test]
async fn corrupt_file_fails_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seen_urls.json");
    fs::write(&path, "{not json").unwrap();

    let mut store = SeenStore::new(JsonFileBackend::new(&path));
    let err = store.load().await.unwrap_err();
    assert!(matches!(err, PersistenceError::Corrupt(_)));
}

#[tokio::test]
async fn failed_write_leaves_no_tmp_file_behind() {
    let dir = tempfile::tempdir().unwrap();
    // A directory at the target path makes the final rename fail.
    let path = dir.path().join("seen_urls.json");
    fs::create_dir_all(path.join("occupied")).unwrap();

    let mut store = SeenStore::new(JsonFileBackend::new(&path));
    store.stage("https://acme.com/jobs/1");
    let err = store.commit().await.unwrap_err();
    assert!(matches!(err, PersistenceError::Io { .. }));
    assert!(!dir.path().join("seen_urls.json.tmp").exists());
    assert!(!store.contains("https://acme.com/jobs/1"));
}
