//! File-backed persistence: rows survive engine restarts and are visible
//! through the read pool.

use tmws_core::models::{Memory, SearchFilters};
use tmws_core::traits::IMemoryStore;
use tmws_storage::StorageEngine;

#[test]
fn rows_survive_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("tmws.db");

    let id = {
        let eng = StorageEngine::open(&db, "test-model").expect("open");
        let mut m = Memory::new("athena-conductor", "default", "durable fact");
        m.tags = vec!["persist".into()];
        eng.insert_memory(&m, &[0.6, 0.8]).expect("insert");
        m.id
    };

    let eng = StorageEngine::open(&db, "test-model").expect("reopen");
    let got = eng.get_memory(id).expect("get").expect("row survived");
    assert_eq!(got.content, "durable fact");
    assert_eq!(got.tags, vec!["persist"]);

    // Vector search works against the reopened file through the read pool.
    let hits = eng
        .search(&[0.6, 0.8], &SearchFilters::default(), 5, 0.5)
        .expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].memory.id, id);
    assert!(hits[0].similarity > 0.99);
}

#[test]
fn migrations_are_idempotent_across_opens() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("tmws.db");
    for _ in 0..3 {
        let eng = StorageEngine::open(&db, "test-model").expect("open");
        eng.storage_health().expect("health");
    }
}
