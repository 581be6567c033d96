//! 磁盘历史存储测试：持久化格式、跨实例并发、配置装配

use push_inbox::notification::{
    DetailView, DuplicatePolicy, FileStore, HistoryStore, KeyValueStore, ManualClock,
    StoreOutcome, SystemClock, DEFAULT_STORAGE_KEY,
};
use push_inbox::Config;
use std::fs;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn create_test_store(dir: &TempDir) -> HistoryStore {
    HistoryStore::new(
        Arc::new(FileStore::new(dir.path())),
        Arc::new(ManualClock::new(1_700_000_000_000)),
    )
}

#[test]
fn test_history_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = create_test_store(&dir);
        store.append("First", "one", "a");
        store.append("Second", "two", "b");
    }

    let reopened = create_test_store(&dir);
    let ids: Vec<String> = reopened.list().into_iter().map(|r| r.message_id).collect();
    assert_eq!(ids, vec!["b", "a"]);
}

#[test]
fn test_persisted_layout_is_camel_case_array() {
    let dir = TempDir::new().unwrap();
    let store = create_test_store(&dir);
    store.append("Hello", "World", "m1");

    let path = FileStore::new(dir.path()).path_for(DEFAULT_STORAGE_KEY);
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(
        json,
        serde_json::json!([{
            "title": "Hello",
            "body": "World",
            "timestamp": 1_700_000_000_000i64,
            "messageId": "m1"
        }])
    );
}

#[test]
fn test_corrupt_file_recovers_on_next_append() {
    let dir = TempDir::new().unwrap();
    let backend = FileStore::new(dir.path());
    backend.set(DEFAULT_STORAGE_KEY, "{ broken").unwrap();

    let store = create_test_store(&dir);
    assert!(store.list().is_empty());
    assert!(matches!(store.append("A", "a", "1"), StoreOutcome::Written(_)));
    assert_eq!(store.list().len(), 1);
}

#[test]
fn test_clear_then_detail_not_found() {
    let dir = TempDir::new().unwrap();
    let store = create_test_store(&dir);
    store.append("A", "a", "1");

    assert_eq!(store.clear(), StoreOutcome::Cleared);
    let view = DetailView::lookup(&store, "1");
    assert!(!view.is_found());
    assert_eq!(view.render(), "Message not found or ID: 1");
}

#[test]
fn test_concurrent_appends_from_separate_instances() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().to_path_buf();

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let path = path.clone();
            thread::spawn(move || {
                // 每个线程独立打开存储，相当于不同进程
                let store = HistoryStore::new(Arc::new(FileStore::new(path)), Arc::new(SystemClock));
                for i in 0..15 {
                    let outcome = store.append("T", "B", &format!("{}-{}", worker, i));
                    assert!(!outcome.is_failure());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let store = HistoryStore::new(Arc::new(FileStore::new(&path)), Arc::new(SystemClock));
    let records = store.list();
    assert_eq!(records.len(), 60);
    for worker in 0..4 {
        for i in 0..15 {
            let id = format!("{}-{}", worker, i);
            assert!(records.iter().any(|r| r.message_id == id), "missing {}", id);
        }
    }
}

#[test]
fn test_config_wires_store_options() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.json");
    fs::write(
        &config_path,
        serde_json::json!({
            "data_dir": dir.path().join("data"),
            "storage_key": "@inbox",
            "default_title": "Untitled",
            "duplicate_policy": "dedup_on_write",
            "max_records": 2
        })
        .to_string(),
    )
    .unwrap();

    let config = Config::load_from(&config_path).unwrap();
    assert_eq!(config.duplicate_policy, DuplicatePolicy::DedupOnWrite);
    assert_eq!(config.link_prefixes, vec!["app://".to_string()]);

    let store = Arc::new(config.open_store(Arc::new(ManualClock::new(0))));
    assert_eq!(store.key(), "@inbox");
    assert!(matches!(store.append("A", "a", "1"), StoreOutcome::Written(_)));
    assert!(matches!(store.append("A", "a", "1"), StoreOutcome::Skipped(_)));
    store.append("B", "b", "2");
    store.append("C", "c", "3");

    let ids: Vec<String> = store.list().into_iter().map(|r| r.message_id).collect();
    assert_eq!(ids, vec!["3", "2"]);
    assert!(dir.path().join("data").join("inbox.json").exists());

    let pipeline = config.pipeline(store);
    let ingested = pipeline.ingest(
        push_inbox::DeliveryChannel::Background,
        &push_inbox::RawMessage::new().with_data_message_id("4"),
    );
    assert_eq!(ingested.title, "Untitled");
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.json");
    fs::write(&config_path, r#"{"link_prefixes": []}"#).unwrap();

    let err = Config::load_from(&config_path).unwrap_err();
    assert!(err.to_string().contains("link_prefixes"));
}
