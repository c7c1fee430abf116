// Tests for the mapping store

use albo_core::data::MappingStore;
use albo_scanner::Discovery;
use chrono::Utc;
use tempfile::TempDir;

const BASE_URL: &str = "https://registry.example/getfile.aspx";

fn create_test_store() -> (TempDir, MappingStore) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let store = MappingStore::open(&db_path).unwrap();
    (temp_dir, store)
}

fn discovery(param: i64, key: i64) -> Discovery {
    Discovery {
        param,
        key,
        size_bytes: Some(2048),
        content_type: Some("application/pdf".to_string()),
        probed_at: Utc::now(),
    }
}

// ============================================================================
// Store Creation Tests
// ============================================================================

#[test]
fn test_store_creation() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let store = MappingStore::open(&db_path);
    assert!(store.is_ok());
    assert!(db_path.exists());
    assert_eq!(store.unwrap().count().unwrap(), 0);
}

// ============================================================================
// Run Lifecycle Tests
// ============================================================================

#[test]
fn test_create_run() {
    let (_temp_dir, store) = create_test_store();

    let run_id = store.create_run(BASE_URL, None).unwrap();
    assert!(!run_id.is_empty());

    let run = store.get_run(&run_id).unwrap().unwrap();
    assert_eq!(run.status, "running");
    assert_eq!(run.base_url, BASE_URL);
    assert!(run.end_time.is_none());
}

#[test]
fn test_runs_have_distinct_ids() {
    let (_temp_dir, store) = create_test_store();

    let run1 = store.create_run(BASE_URL, None).unwrap();
    let run2 = store.create_run(BASE_URL, Some("{}")).unwrap();
    assert_ne!(run1, run2);
}

#[test]
fn test_run_status_transitions() {
    let (_temp_dir, store) = create_test_store();

    let completed = store.create_run(BASE_URL, None).unwrap();
    store.complete_run(&completed).unwrap();
    assert_eq!(store.get_run(&completed).unwrap().unwrap().status, "completed");

    let failed = store.create_run(BASE_URL, None).unwrap();
    store.fail_run(&failed).unwrap();
    assert_eq!(store.get_run(&failed).unwrap().unwrap().status, "failed");

    let cancelled = store.create_run(BASE_URL, None).unwrap();
    store.cancel_run(&cancelled).unwrap();
    let run = store.get_run(&cancelled).unwrap().unwrap();
    assert_eq!(run.status, "cancelled");
    assert!(run.end_time.is_some());
}

// ============================================================================
// Mapping Insert Tests
// ============================================================================

#[test]
fn test_insert_batch_counts_new_rows() {
    let (_temp_dir, mut store) = create_test_store();
    let run_id = store.create_run(BASE_URL, None).unwrap();

    let batch = vec![discovery(50416, 56609), discovery(50416, 56610)];
    let inserted = store.insert_batch(&run_id, BASE_URL, &batch).unwrap();

    assert_eq!(inserted, 2);
    assert_eq!(store.count().unwrap(), 2);
}

#[test]
fn test_reinserting_known_pairs_is_a_noop() {
    let (_temp_dir, mut store) = create_test_store();
    let run_id = store.create_run(BASE_URL, None).unwrap();

    let batch = vec![discovery(50416, 56609)];
    assert_eq!(store.insert_batch(&run_id, BASE_URL, &batch).unwrap(), 1);
    assert_eq!(store.insert_batch(&run_id, BASE_URL, &batch).unwrap(), 0);
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn test_first_seen_metadata_is_kept() {
    let (_temp_dir, mut store) = create_test_store();
    let run1 = store.create_run(BASE_URL, None).unwrap();
    let run2 = store.create_run(BASE_URL, None).unwrap();

    let mut original = discovery(50416, 56609);
    original.size_bytes = Some(100);
    store.insert_batch(&run1, BASE_URL, &[original]).unwrap();

    let mut rediscovered = discovery(50416, 56609);
    rediscovered.size_bytes = Some(999);
    store.insert_batch(&run2, BASE_URL, &[rediscovered]).unwrap();

    let entries = store.load_all().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].size_bytes, Some(100));
    assert_eq!(entries[0].source_run, run1);
}

#[test]
fn test_entries_record_the_file_url() {
    let (_temp_dir, mut store) = create_test_store();
    let run_id = store.create_run(BASE_URL, None).unwrap();

    store
        .insert_batch(&run_id, BASE_URL, &[discovery(50416, 56609)])
        .unwrap();

    let entries = store.load_all().unwrap();
    assert_eq!(
        entries[0].url,
        "https://registry.example/getfile.aspx?SOURCE=DB&PARAM=50416&KEY=56609"
    );
}

// ============================================================================
// Query and Reopen Tests
// ============================================================================

#[test]
fn test_load_all_orders_params_descending_keys_ascending() {
    let (_temp_dir, mut store) = create_test_store();
    let run_id = store.create_run(BASE_URL, None).unwrap();

    let batch = vec![
        discovery(50400, 56500),
        discovery(50416, 56612),
        discovery(50416, 56609),
        discovery(50410, 56550),
    ];
    store.insert_batch(&run_id, BASE_URL, &batch).unwrap();

    let pairs: Vec<(i64, i64)> = store
        .load_all()
        .unwrap()
        .iter()
        .map(|e| (e.param, e.key))
        .collect();
    assert_eq!(
        pairs,
        vec![(50416, 56609), (50416, 56612), (50410, 56550), (50400, 56500)]
    );
    assert_eq!(store.known_pairs().unwrap(), pairs);
}

#[test]
fn test_entries_for_run_only_returns_that_run() {
    let (_temp_dir, mut store) = create_test_store();
    let run1 = store.create_run(BASE_URL, None).unwrap();
    let run2 = store.create_run(BASE_URL, None).unwrap();

    store
        .insert_batch(&run1, BASE_URL, &[discovery(50400, 56500)])
        .unwrap();
    store
        .insert_batch(&run2, BASE_URL, &[discovery(50416, 56609)])
        .unwrap();

    let entries = store.entries_for_run(&run2).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!((entries[0].param, entries[0].key), (50416, 56609));
}

#[test]
fn test_store_grows_monotonically_across_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let count_after_first = {
        let mut store = MappingStore::open(&db_path).unwrap();
        let run_id = store.create_run(BASE_URL, None).unwrap();
        store
            .insert_batch(&run_id, BASE_URL, &[discovery(50416, 56609)])
            .unwrap();
        store.complete_run(&run_id).unwrap();
        store.count().unwrap()
    };
    assert_eq!(count_after_first, 1);

    let mut store = MappingStore::open(&db_path).unwrap();
    assert_eq!(store.count().unwrap(), 1);

    // A second run re-seeing old pairs and adding a new one only grows it.
    let run_id = store.create_run(BASE_URL, None).unwrap();
    store
        .insert_batch(
            &run_id,
            BASE_URL,
            &[discovery(50416, 56609), discovery(50417, 56700)],
        )
        .unwrap();
    assert_eq!(store.count().unwrap(), 2);
}
