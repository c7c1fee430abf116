// Tests for report generation and sinks

use albo_core::analyze::{self, DEFAULT_GAP_LIMIT};
use albo_core::data::MappingStore;
use albo_core::report::{
    FileSink, ReportSink, gather_report_data, generate_json_report, generate_text_report,
};
use albo_scanner::{Discovery, RunDiagnostics};
use chrono::Utc;
use tempfile::TempDir;

const BASE_URL: &str = "https://registry.example/getfile.aspx";

fn discovery(param: i64, key: i64) -> Discovery {
    Discovery {
        param,
        key,
        size_bytes: Some(4096),
        content_type: Some("application/pdf".to_string()),
        probed_at: Utc::now(),
    }
}

fn populated_store() -> (TempDir, MappingStore, String) {
    let temp_dir = TempDir::new().unwrap();
    let mut store = MappingStore::open(&temp_dir.path().join("test.db")).unwrap();
    let run_id = store.create_run(BASE_URL, None).unwrap();

    let batch = vec![
        discovery(50414, 56600),
        discovery(50415, 56601),
        discovery(50416, 56609),
        discovery(50416, 56610),
    ];
    store.insert_batch(&run_id, BASE_URL, &batch).unwrap();
    store.complete_run(&run_id).unwrap();

    (temp_dir, store, run_id)
}

fn report_data(store: &MappingStore, run_id: &str) -> albo_core::report::ReportData {
    let run = store.get_run(run_id).unwrap().unwrap();
    let entries = store.load_all().unwrap();
    let analysis = analyze::analyze(&entries, DEFAULT_GAP_LIMIT);
    let diagnostics = RunDiagnostics {
        probes_total: 42,
        found: 4,
        not_found: 38,
        ..Default::default()
    };
    gather_report_data(store, &run, diagnostics, analysis).unwrap()
}

// ============================================================================
// JSON Report Tests
// ============================================================================

#[test]
fn test_json_report_structure() {
    let (_temp_dir, store, run_id) = populated_store();
    let data = report_data(&store, &run_id);

    let json = generate_json_report(&data).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    let report = &parsed["report"];

    assert_eq!(report["metadata"]["generator"], "albo");
    assert_eq!(report["run"]["id"], run_id);
    assert_eq!(report["run"]["status"], "completed");
    assert_eq!(report["summary"]["total_mappings"], 4);
    assert_eq!(report["summary"]["new_mappings"], 4);
    assert_eq!(report["summary"]["probes"]["total"], 42);
    assert_eq!(report["pattern_analysis"]["total_params"], 3);
    assert_eq!(report["new_entries"].as_array().unwrap().len(), 4);
}

#[test]
fn test_json_mappings_grouped_by_param_descending() {
    let (_temp_dir, store, run_id) = populated_store();
    let data = report_data(&store, &run_id);

    let json = generate_json_report(&data).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    let mappings = parsed["report"]["mappings"].as_array().unwrap();

    let params: Vec<i64> = mappings.iter().map(|m| m["param"].as_i64().unwrap()).collect();
    assert_eq!(params, vec![50416, 50415, 50414]);

    let keys: Vec<i64> = mappings[0]["keys"]
        .as_array()
        .unwrap()
        .iter()
        .map(|k| k.as_i64().unwrap())
        .collect();
    assert_eq!(keys, vec![56609, 56610]);
}

// ============================================================================
// Text Report Tests
// ============================================================================

#[test]
fn test_text_report_summarizes_the_run() {
    let (_temp_dir, store, run_id) = populated_store();
    let data = report_data(&store, &run_id);

    let text = generate_text_report(&data);

    assert!(text.contains("ALBO DISCOVERY RUN REPORT"));
    assert!(text.contains(&format!("Run ID:       {}", run_id)));
    assert!(text.contains("Status:       Completed"));
    assert!(text.contains("4 total, 4 new this run"));
    assert!(text.contains("Probes Issued:   42"));
    assert!(text.contains("NEW MAPPINGS"));
    assert!(text.contains("56609"));
}

#[test]
fn test_text_report_omits_new_mappings_section_when_empty() {
    let (_temp_dir, store, _run_id) = populated_store();

    // A later run that found nothing new.
    let empty_run = store.create_run(BASE_URL, None).unwrap();
    store.complete_run(&empty_run).unwrap();
    let data = report_data(&store, &empty_run);

    let text = generate_text_report(&data);
    assert!(text.contains("4 total, 0 new this run"));
    assert!(!text.contains("NEW MAPPINGS"));
}

// ============================================================================
// Sink Tests
// ============================================================================

#[test]
fn test_file_sink_writes_and_reports_its_path() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("export.json");

    let sink = FileSink::new(&path);
    let written = sink.write("{\"ok\":true}").unwrap();

    assert_eq!(written, Some(path.clone()));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"ok\":true}");
}
