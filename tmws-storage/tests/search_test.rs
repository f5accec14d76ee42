//! Vector search ordering, filtering, visibility, and lexical fallback.

use tmws_core::models::{Memory, MemoryAccess, ShareGrant, SharePermission};
use tmws_core::models::{RecallOrder, SearchFilters, Visibility};
use tmws_core::traits::IMemoryStore;
use tmws_storage::StorageEngine;

fn engine() -> StorageEngine {
    StorageEngine::open_in_memory().expect("open in-memory storage")
}

fn insert(
    eng: &StorageEngine,
    owner: &str,
    namespace: &str,
    content: &str,
    access: MemoryAccess,
    embedding: &[f32],
) -> Memory {
    let mut m = Memory::new(owner, namespace, content);
    m.access_level = access;
    if access == MemoryAccess::Shared {
        m.shared_with = vec![ShareGrant {
            agent_id: "grantee".into(),
            permission: SharePermission::Read,
        }];
    }
    eng.insert_memory(&m, embedding).unwrap();
    m
}

#[test]
fn results_ordered_by_similarity() {
    let eng = engine();
    let exact = insert(&eng, "a", "default", "exact", MemoryAccess::Private, &[1.0, 0.0, 0.0]);
    let near = insert(&eng, "a", "default", "near", MemoryAccess::Private, &[0.9, 0.1, 0.0]);
    let far = insert(&eng, "a", "default", "far", MemoryAccess::Private, &[0.0, 0.0, 1.0]);

    let hits = eng
        .search(&[1.0, 0.0, 0.0], &SearchFilters::default(), 10, 0.0)
        .unwrap();
    let ids: Vec<_> = hits.iter().map(|h| h.memory.id).collect();
    assert_eq!(ids[0], exact.id);
    assert_eq!(ids[1], near.id);
    assert_eq!(ids[2], far.id);
    assert!((hits[0].similarity - 1.0).abs() < 1e-9);
}

#[test]
fn min_similarity_cuts_low_scores() {
    let eng = engine();
    insert(&eng, "a", "default", "close", MemoryAccess::Private, &[1.0, 0.0, 0.0]);
    insert(&eng, "a", "default", "orthogonal", MemoryAccess::Private, &[0.0, 1.0, 0.0]);

    let hits = eng
        .search(&[1.0, 0.0, 0.0], &SearchFilters::default(), 10, 0.5)
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].memory.content, "close");
}

#[test]
fn search_k_is_prefix_of_k_plus_one() {
    let eng = engine();
    for i in 0..6 {
        let mut v = vec![0.2f32; 4];
        v[i % 4] += 0.2 * i as f32;
        insert(&eng, "a", "default", &format!("memory {i}"), MemoryAccess::Private, &v);
    }

    let query = [0.7f32, 0.2, 0.05, 0.05];
    for k in 1..6 {
        let smaller = eng.search(&query, &SearchFilters::default(), k, 0.0).unwrap();
        let larger = eng.search(&query, &SearchFilters::default(), k + 1, 0.0).unwrap();
        let small_ids: Vec<_> = smaller.iter().map(|h| h.memory.id).collect();
        let large_ids: Vec<_> = larger.iter().map(|h| h.memory.id).collect();
        assert_eq!(small_ids[..], large_ids[..small_ids.len()]);
    }
}

#[test]
fn equal_similarity_breaks_ties_by_importance() {
    let eng = engine();
    let mut low = Memory::new("a", "default", "low importance");
    low.importance = 0.2;
    eng.insert_memory(&low, &[1.0, 0.0]).unwrap();
    let mut high = Memory::new("a", "default", "high importance");
    high.importance = 0.9;
    eng.insert_memory(&high, &[1.0, 0.0]).unwrap();

    let hits = eng
        .search(&[1.0, 0.0], &SearchFilters::default(), 2, 0.0)
        .unwrap();
    assert_eq!(hits[0].memory.id, high.id);
    assert_eq!(hits[1].memory.id, low.id);
}

#[test]
fn zero_query_vector_matches_nothing() {
    let eng = engine();
    insert(&eng, "a", "default", "anything", MemoryAccess::Private, &[1.0, 0.0]);
    let hits = eng
        .search(&[0.0, 0.0], &SearchFilters::default(), 10, 0.0)
        .unwrap();
    assert!(hits.is_empty());
}

#[test]
fn dimension_mismatches_are_skipped() {
    let eng = engine();
    insert(&eng, "a", "default", "three dims", MemoryAccess::Private, &[1.0, 0.0, 0.0]);
    insert(&eng, "a", "default", "two dims", MemoryAccess::Private, &[1.0, 0.0]);

    let hits = eng
        .search(&[1.0, 0.0], &SearchFilters::default(), 10, 0.0)
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].memory.content, "two dims");
}

#[test]
fn tag_filter_requires_every_tag() {
    let eng = engine();
    let mut tagged = Memory::new("a", "default", "both tags");
    tagged.tags = vec!["alpha".into(), "beta".into()];
    eng.insert_memory(&tagged, &[1.0, 0.0]).unwrap();
    let mut partial = Memory::new("a", "default", "one tag");
    partial.tags = vec!["alpha".into()];
    eng.insert_memory(&partial, &[1.0, 0.0]).unwrap();

    let filters = SearchFilters {
        tags: vec!["alpha".into(), "beta".into()],
        ..Default::default()
    };
    let hits = eng.search(&[1.0, 0.0], &filters, 10, 0.0).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].memory.id, tagged.id);
}

#[test]
fn visibility_excludes_other_agents_private_rows() {
    let eng = engine();
    insert(&eng, "owner", "default", "private note", MemoryAccess::Private, &[1.0, 0.0]);
    insert(&eng, "owner", "default", "team note", MemoryAccess::Team, &[1.0, 0.0]);
    insert(&eng, "owner", "default", "public note", MemoryAccess::Public, &[1.0, 0.0]);
    insert(&eng, "owner", "other-ns", "other team note", MemoryAccess::Team, &[1.0, 0.0]);

    let filters = SearchFilters {
        visible_to: Some(Visibility {
            agent_id: "peer".into(),
            namespace: "default".into(),
            include_shared: true,
            can_read_system: false,
        }),
        ..Default::default()
    };
    let hits = eng.search(&[1.0, 0.0], &filters, 10, 0.0).unwrap();
    let contents: Vec<_> = hits.iter().map(|h| h.memory.content.as_str()).collect();
    assert!(contents.contains(&"team note"));
    assert!(contents.contains(&"public note"));
    assert!(!contents.contains(&"private note"));
    assert!(!contents.contains(&"other team note"));
}

#[test]
fn visibility_includes_rows_shared_with_principal() {
    let eng = engine();
    insert(&eng, "owner", "default", "shared note", MemoryAccess::Shared, &[1.0, 0.0]);

    let visible = |include_shared| SearchFilters {
        visible_to: Some(Visibility {
            agent_id: "grantee".into(),
            namespace: "elsewhere".into(),
            include_shared,
            can_read_system: false,
        }),
        ..Default::default()
    };

    let hits = eng.search(&[1.0, 0.0], &visible(true), 10, 0.0).unwrap();
    assert_eq!(hits.len(), 1);

    let hits = eng.search(&[1.0, 0.0], &visible(false), 10, 0.0).unwrap();
    assert!(hits.is_empty());

    // A different principal sees nothing either way.
    let other = SearchFilters {
        visible_to: Some(Visibility {
            agent_id: "stranger".into(),
            namespace: "elsewhere".into(),
            include_shared: true,
            can_read_system: false,
        }),
        ..Default::default()
    };
    assert!(eng.search(&[1.0, 0.0], &other, 10, 0.0).unwrap().is_empty());
}

#[test]
fn system_rows_need_elevated_visibility() {
    let eng = engine();
    insert(&eng, "hestia-auditor", "system", "audit trail", MemoryAccess::System, &[1.0, 0.0]);

    let mut vis = Visibility {
        agent_id: "peer".into(),
        namespace: "default".into(),
        include_shared: true,
        can_read_system: false,
    };
    let filters = SearchFilters { visible_to: Some(vis.clone()), ..Default::default() };
    assert!(eng.search(&[1.0, 0.0], &filters, 10, 0.0).unwrap().is_empty());

    vis.can_read_system = true;
    let filters = SearchFilters { visible_to: Some(vis), ..Default::default() };
    assert_eq!(eng.search(&[1.0, 0.0], &filters, 10, 0.0).unwrap().len(), 1);
}

#[test]
fn lexical_search_matches_terms() {
    let eng = engine();
    insert(&eng, "a", "default", "the rust borrow checker", MemoryAccess::Private, &[1.0, 0.0]);
    insert(&eng, "a", "default", "python garbage collector", MemoryAccess::Private, &[0.0, 1.0]);

    let hits = eng
        .search_lexical("rust checker", &SearchFilters::default(), 10)
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].content, "the rust borrow checker");

    // Hostile match syntax is neutralised, not executed.
    eng.search_lexical("\"unbalanced ( NEAR", &SearchFilters::default(), 10)
        .unwrap();
}

#[test]
fn recall_pages_in_stable_order() {
    let eng = engine();
    for i in 0..5 {
        let mut m = Memory::new("a", "default", format!("memory {i}"));
        m.importance = 0.1 * i as f64;
        eng.insert_memory(&m, &[1.0, 0.0]).unwrap();
    }

    let filters = SearchFilters { owner: Some("a".into()), ..Default::default() };
    let first = eng.recall(&filters, RecallOrder::ImportanceDesc, 2, 0).unwrap();
    let second = eng.recall(&filters, RecallOrder::ImportanceDesc, 2, 2).unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);
    assert_eq!(first[0].content, "memory 4");
    assert_eq!(first[1].content, "memory 3");
    assert_eq!(second[0].content, "memory 2");
    assert!(first.iter().all(|m| !second.iter().any(|s| s.id == m.id)));
}
