//! Integration tests for list imports through a processor chain.
//!
//! These tests drive whole import rows through chained list processors
//! backed by one SQLite store and check the stored lists afterwards.

use listsync_core::{
    FieldMapping, ImportRun, ItemId, ListProcessor, ListProcessorConfig, ListSearch, ListStore,
    ListSyncError, ParentItem, PositionSequencer, Processor, RawRow, SqliteStore,
};
use tempfile::TempDir;

struct TestEnv {
    store: SqliteStore,
    _temp_dir: TempDir,
}

/// Create a store with registered list types and referenced entities.
fn create_test_env() -> TestEnv {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = SqliteStore::open_at(&temp_dir.path().join("db").join("lists.db"), "product")
        .expect("Failed to open store")
        .with_editor("import:test");

    for code in ["default", "suggestion", "bought-together"] {
        store.register_type("product", code, code).unwrap();
    }
    store.register_type("media", "default", "Standard").unwrap();

    for code in ["U:TEST", "U:OTHER", "CNC", "CNE", "ABCD", "EFGH"] {
        store.insert_entity("product", code, code).unwrap();
    }
    for code in ["img-1", "img-2"] {
        store.insert_entity("media", code, code).unwrap();
    }

    TestEnv {
        store,
        _temp_dir: temp_dir,
    }
}

fn parent(env: &TestEnv, code: &str) -> ParentItem {
    let id = env.store.entity_id("product", code).unwrap().unwrap();
    ParentItem::new(id, code)
}

fn raw(values: &[(usize, &str)]) -> RawRow {
    values
        .iter()
        .map(|(pos, value)| (*pos, value.to_string()))
        .collect()
}

/// Product relations in columns 2-5, images in columns 6-7.
fn chain(store: &SqliteStore) -> ListProcessor<'_> {
    let media = ListProcessor::from_store(
        ListProcessorConfig::new("product", "media"),
        FieldMapping::consecutive(6, ["media.code", "media.code"]),
        store,
    );
    ListProcessor::from_store(
        ListProcessorConfig::new("product", "product"),
        FieldMapping::consecutive(
            2,
            ["product.code", "product.list.type", "product.code", "product.list.type"],
        ),
        store,
    )
    .with_next(media)
}

/// (domain, ref code, position) of every list item of `parent`, in store order.
fn lists(env: &TestEnv, parent: &ParentItem, domain: &str) -> Vec<(String, u32)> {
    env.store
        .search(&ListSearch::new().parent(parent.id).domain(domain))
        .unwrap()
        .into_iter()
        .map(|item| (item.ref_code().unwrap_or_default().to_string(), item.position()))
        .collect()
}

fn entries(values: &[(&str, u32)]) -> Vec<(String, u32)> {
    values
        .iter()
        .map(|(code, position)| (code.to_string(), *position))
        .collect()
}

#[test]
fn test_chain_imports_all_domains() {
    let env = create_test_env();
    let product = parent(&env, "U:TEST");
    let mut run = ImportRun::new();

    let remaining = chain(&env.store)
        .process(
            &mut run,
            &product,
            raw(&[
                (0, "U:TEST"),
                (1, "Test product"),
                (2, "CNC"),
                (3, "default"),
                (4, "CNE"),
                (5, "default"),
                (6, "img-1"),
                (7, "img-2"),
            ]),
        )
        .unwrap();

    assert_eq!(remaining, raw(&[(0, "U:TEST"), (1, "Test product")]));
    assert_eq!(lists(&env, &product, "product"), entries(&[("CNC", 1), ("CNE", 2)]));
    assert_eq!(lists(&env, &product, "media"), entries(&[("img-1", 1), ("img-2", 2)]));

    let counts = env
        .store
        .aggregate_by_domain(&ListSearch::new().parent(product.id))
        .unwrap();
    assert_eq!(counts.get("product"), Some(&2));
    assert_eq!(counts.get("media"), Some(&2));

    let items = env.store.search(&ListSearch::new().editor("import:test")).unwrap();
    assert_eq!(items.len(), 4);
}

#[test]
fn test_failed_parent_keeps_earlier_parents() {
    let env = create_test_env();
    let first = parent(&env, "U:TEST");
    let second = parent(&env, "U:OTHER");
    let processor = chain(&env.store);
    let mut run = ImportRun::new();

    processor
        .process(&mut run, &first, raw(&[(2, "CNC"), (6, "img-1")]))
        .unwrap();
    processor
        .process(&mut run, &second, raw(&[(2, "ABCD")]))
        .unwrap();

    let err = processor
        .process(&mut run, &second, raw(&[(2, "EFGH"), (6, "img-404")]))
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(err.to_string().contains("img-404"));
    assert!(err.to_string().contains("U:OTHER"));
    assert_eq!(lists(&env, &first, "product"), entries(&[("CNC", 1)]));
    assert_eq!(lists(&env, &first, "media"), entries(&[("img-1", 1)]));
    assert_eq!(lists(&env, &second, "product"), entries(&[("ABCD", 1)]));
    assert!(lists(&env, &second, "media").is_empty());
}

#[test]
fn test_reordered_import_recreates_and_settles() {
    let env = create_test_env();
    let product = parent(&env, "U:TEST");
    let processor = chain(&env.store);

    processor
        .process(&mut ImportRun::new(), &product, raw(&[(2, "CNC"), (4, "CNE")]))
        .unwrap();

    let mut run = ImportRun::new();
    let mut data = raw(&[(2, "CNE"), (4, "CNC")]);
    let rows = FieldMapping::consecutive(
        2,
        ["product.code", "product.list.type", "product.code", "product.list.type"],
    )
    .mapped_chunks(&mut data);
    let config = ListProcessorConfig::new("product", "product");
    let reorder = ListProcessor::from_store(config, FieldMapping::new(), &env.store);

    let outcome = reorder.reconcile(&mut run, &product, &rows, data.clone()).unwrap();
    assert_eq!(outcome.deleted, 2);
    assert_eq!(outcome.created, 2);
    assert_eq!(lists(&env, &product, "product"), entries(&[("CNE", 1), ("CNC", 2)]));

    let again = reorder.reconcile(&mut run, &product, &rows, data).unwrap();
    assert_eq!(again.writes(), 0);
    assert_eq!(again.unchanged, 2);
}

#[test]
fn test_excluded_relations_survive_import() {
    let env = create_test_env();
    let product = parent(&env, "U:TEST");

    let bought = ListProcessor::from_store(
        ListProcessorConfig::new("product", "product")
            .with_list_types(listsync_core::ListTypeFilter::only(["bought-together"])),
        FieldMapping::consecutive(0, ["product.code", "product.list.type"]),
        &env.store,
    );
    bought
        .process(
            &mut ImportRun::new(),
            &product,
            raw(&[(0, "EFGH"), (1, "bought-together")]),
        )
        .unwrap();

    chain(&env.store)
        .process(&mut ImportRun::new(), &product, raw(&[(2, "CNC")]))
        .unwrap();
    chain(&env.store)
        .process(&mut ImportRun::new(), &product, raw(&[(2, "CNE")]))
        .unwrap();

    let items = env
        .store
        .search(&ListSearch::new().parent(product.id).domain("product"))
        .unwrap();
    let mut found: Vec<_> = items
        .iter()
        .map(|item| {
            (
                item.type_code().unwrap_or_default().to_string(),
                item.ref_code().unwrap_or_default().to_string(),
            )
        })
        .collect();
    found.sort();
    assert_eq!(
        found,
        vec![
            ("bought-together".to_string(), "EFGH".to_string()),
            ("default".to_string(), "CNE".to_string()),
        ]
    );
}

#[test]
fn test_move_after_import_keeps_group_dense() {
    let env = create_test_env();
    let product = parent(&env, "U:TEST");
    let processor = ListProcessor::from_store(
        ListProcessorConfig::new("product", "product"),
        FieldMapping::consecutive(0, ["product.code", "product.code", "product.code", "product.code"]),
        &env.store,
    );

    processor
        .process(
            &mut ImportRun::new(),
            &product,
            raw(&[(0, "CNC"), (1, "CNE"), (2, "ABCD"), (3, "EFGH")]),
        )
        .unwrap();

    let ids: Vec<ItemId> = env
        .store
        .search(&ListSearch::new().parent(product.id))
        .unwrap()
        .iter()
        .filter_map(|item| item.id())
        .collect();

    let sequencer = PositionSequencer::new(&env.store);
    let changed = sequencer.move_item(ids[2], Some(ids[0])).unwrap();

    assert_eq!(changed, 3);
    assert_eq!(
        lists(&env, &product, "product"),
        entries(&[("ABCD", 1), ("CNC", 2), ("CNE", 3), ("EFGH", 4)])
    );

    sequencer.move_item(ids[2], None).unwrap();
    assert_eq!(
        lists(&env, &product, "product"),
        entries(&[("CNC", 1), ("CNE", 2), ("EFGH", 3), ("ABCD", 4)])
    );
}

#[test]
fn test_move_across_groups_is_rejected() {
    let env = create_test_env();
    let product = parent(&env, "U:TEST");

    chain(&env.store)
        .process(
            &mut ImportRun::new(),
            &product,
            raw(&[(2, "CNC"), (3, "default"), (4, "CNE"), (5, "suggestion")]),
        )
        .unwrap();

    let items = env.store.search(&ListSearch::new().parent(product.id)).unwrap();
    let ids: Vec<ItemId> = items.iter().filter_map(|item| item.id()).collect();

    let result = PositionSequencer::new(&env.store).move_item(ids[0], Some(ids[1]));
    assert!(matches!(result, Err(ListSyncError::GroupMismatch { .. })));

    let missing = PositionSequencer::new(&env.store).move_item(ItemId(9_999), None);
    assert!(matches!(missing, Err(ListSyncError::NotFound { .. })));

    let after = env.store.search(&ListSearch::new().parent(product.id)).unwrap();
    assert_eq!(after, items);
}
