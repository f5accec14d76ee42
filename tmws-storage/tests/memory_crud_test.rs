//! CRUD round-trips, archive/delete lifecycle, and concurrent writers.

use std::sync::Arc;

use tmws_core::models::{Memory, MemoryAccess, RecallOrder, SearchFilters, ShareGrant};
use tmws_core::traits::IMemoryStore;
use tmws_storage::StorageEngine;

fn engine() -> StorageEngine {
    StorageEngine::open_in_memory().expect("open in-memory storage")
}

fn make_memory(owner: &str, content: &str) -> Memory {
    let mut m = Memory::new(owner, "default", content);
    m.tags = vec!["test".into()];
    m
}

fn unit_vec(dims: usize, hot: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dims];
    v[hot] = 1.0;
    v
}

#[test]
fn insert_then_get_round_trips() {
    let eng = engine();
    let mut m = make_memory("athena-conductor", "kickoff notes");
    m.importance = 0.8;
    m.tags = vec!["project".into(), "kickoff".into()];

    let id = eng.insert_memory(&m, &unit_vec(8, 0)).unwrap();
    assert_eq!(id, m.id);

    let got = eng.get_memory(id).unwrap().expect("memory exists");
    assert_eq!(got.content, "kickoff notes");
    assert_eq!(got.owner_agent_id, "athena-conductor");
    assert_eq!(got.namespace, "default");
    assert_eq!(got.tags, vec!["project", "kickoff"]);
    assert_eq!(got.importance, 0.8);
    assert_eq!(got.access_level, MemoryAccess::Private);
    assert_eq!(got.content_hash, m.content_hash);
    assert!(!got.is_archived);
}

#[test]
fn get_missing_returns_none() {
    let eng = engine();
    assert!(eng.get_memory(uuid::Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn update_is_last_writer_wins() {
    let eng = engine();
    let m = make_memory("athena-conductor", "original");
    eng.insert_memory(&m, &unit_vec(8, 0)).unwrap();

    let mut first = eng.get_memory(m.id).unwrap().unwrap();
    first.importance = 0.1;
    first.tags = vec!["first".into()];
    let mut second = eng.get_memory(m.id).unwrap().unwrap();
    second.importance = 0.9;
    second.tags = vec!["second".into()];

    eng.update_memory(&first, None).unwrap();
    eng.update_memory(&second, None).unwrap();

    let got = eng.get_memory(m.id).unwrap().unwrap();
    assert_eq!(got.importance, 0.9);
    assert_eq!(got.tags, vec!["second"]);
}

#[test]
fn concurrent_updates_leave_one_whole_patch() {
    let eng = Arc::new(engine());
    let m = make_memory("athena-conductor", "contested");
    eng.insert_memory(&m, &unit_vec(8, 0)).unwrap();

    let mut a = eng.get_memory(m.id).unwrap().unwrap();
    a.importance = 0.2;
    a.tags = vec!["patch-a".into()];
    let mut b = eng.get_memory(m.id).unwrap().unwrap();
    b.importance = 0.7;
    b.tags = vec!["patch-b".into()];

    let eng_a = Arc::clone(&eng);
    let eng_b = Arc::clone(&eng);
    let ha = std::thread::spawn(move || eng_a.update_memory(&a, None));
    let hb = std::thread::spawn(move || eng_b.update_memory(&b, None));
    ha.join().unwrap().unwrap();
    hb.join().unwrap().unwrap();

    // Whatever the interleaving, the final row is one of the two patches,
    // never a mix.
    let got = eng.get_memory(m.id).unwrap().unwrap();
    let whole_a = got.importance == 0.2 && got.tags == vec!["patch-a"];
    let whole_b = got.importance == 0.7 && got.tags == vec!["patch-b"];
    assert!(whole_a || whole_b, "mixed row: {got:?}");
}

#[test]
fn update_missing_memory_is_not_found() {
    let eng = engine();
    let ghost = make_memory("athena-conductor", "never inserted");
    let err = eng.update_memory(&ghost, None).unwrap_err();
    assert_eq!(err.code(), "ErrNotFound");
}

#[test]
fn archive_hides_from_recall_until_included() {
    let eng = engine();
    let m = make_memory("athena-conductor", "to archive");
    eng.insert_memory(&m, &unit_vec(8, 0)).unwrap();
    eng.archive_memory(m.id, true).unwrap();

    let filters = SearchFilters {
        owner: Some("athena-conductor".into()),
        ..Default::default()
    };
    let visible = eng.recall(&filters, RecallOrder::UpdatedDesc, 10, 0).unwrap();
    assert!(visible.is_empty());

    let with_archived = SearchFilters {
        owner: Some("athena-conductor".into()),
        include_archived: true,
        ..Default::default()
    };
    let all = eng.recall(&with_archived, RecallOrder::UpdatedDesc, 10, 0).unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].is_archived);

    // Unarchive restores visibility.
    eng.archive_memory(m.id, false).unwrap();
    let restored = eng.recall(&filters, RecallOrder::UpdatedDesc, 10, 0).unwrap();
    assert_eq!(restored.len(), 1);
}

#[test]
fn hard_delete_removes_row_and_link() {
    let eng = engine();
    let m = make_memory("athena-conductor", "to delete");
    eng.insert_memory(&m, &unit_vec(8, 0)).unwrap();

    eng.delete_memory(m.id).unwrap();
    assert!(eng.get_memory(m.id).unwrap().is_none());

    // Deleting again reports not-found.
    let err = eng.delete_memory(m.id).unwrap_err();
    assert_eq!(err.code(), "ErrNotFound");
}

#[test]
fn bump_access_updates_counters_not_updated_at() {
    let eng = engine();
    let m = make_memory("athena-conductor", "counted");
    eng.insert_memory(&m, &unit_vec(8, 0)).unwrap();
    let before = eng.get_memory(m.id).unwrap().unwrap();

    eng.bump_access(&[m.id]).unwrap();
    eng.bump_access(&[m.id]).unwrap();

    let after = eng.get_memory(m.id).unwrap().unwrap();
    assert_eq!(after.access_count, 2);
    assert_eq!(after.updated_at, before.updated_at);
    assert!(after.last_accessed_at >= before.last_accessed_at);
}

#[test]
fn shared_grants_round_trip() {
    let eng = engine();
    let mut m = make_memory("agent-a", "shared note");
    m.access_level = MemoryAccess::Shared;
    m.prior_access_level = Some(MemoryAccess::Private);
    m.shared_with = vec![ShareGrant {
        agent_id: "agent-b".into(),
        permission: tmws_core::models::SharePermission::Read,
    }];
    eng.insert_memory(&m, &unit_vec(8, 0)).unwrap();

    let got = eng.get_memory(m.id).unwrap().unwrap();
    assert_eq!(got.access_level, MemoryAccess::Shared);
    assert_eq!(got.prior_access_level, Some(MemoryAccess::Private));
    assert_eq!(got.shared_with.len(), 1);
    assert_eq!(got.shared_with[0].agent_id, "agent-b");
}

#[test]
fn parent_id_round_trips() {
    let eng = engine();
    let parent = make_memory("athena-conductor", "parent");
    eng.insert_memory(&parent, &unit_vec(8, 0)).unwrap();

    let mut child = make_memory("athena-conductor", "child");
    child.parent_memory_id = Some(parent.id);
    eng.insert_memory(&child, &unit_vec(8, 1)).unwrap();

    let got = eng.get_memory(child.id).unwrap().unwrap();
    assert_eq!(got.parent_memory_id, Some(parent.id));
}
