use crate::analyze::{self, PatternAnalysis};
use crate::data::MappingStore;
use crate::error::{DiscoveryError, Result};
use crate::model::MappingEntry;
use crate::report::{self, ReportSink};
use albo_scanner::{DiscoveryEngine, HttpProbe, RunDiagnostics, ScanConfig};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

/// Options for one discovery invocation.
pub struct DiscoveryOptions {
    pub db_path: PathBuf,
    pub scan: ScanConfig,
    /// Key gap between consecutive params still counted as sequential.
    pub gap_limit: i64,
}

/// Callback for reporting discovery progress (probes issued, discoveries).
pub type DiscoveryProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// What one invocation produced, after persistence and export.
#[derive(Debug)]
pub struct DiscoveryReport {
    pub run_id: String,
    pub new_entries: Vec<MappingEntry>,
    pub total_entries: usize,
    pub diagnostics: RunDiagnostics,
    pub analysis: PatternAnalysis,
    /// Where the JSON export landed, if the sink writes to a path.
    pub export_path: Option<PathBuf>,
    /// Human-readable change summary for the embedding binary to display.
    pub text_summary: String,
    pub cancelled: bool,
}

/// Execute a full discovery run: open the store, probe, persist, analyze,
/// export. Repeated invocations against an unchanged remote are incremental
/// and idempotent; the store only ever grows.
///
/// If persistence fails mid-run, everything flushed before the failure is
/// already durable; those entries are exported through the sink and the run
/// row is marked failed before the error is returned.
pub async fn execute_discovery(
    options: DiscoveryOptions,
    cancel: Arc<AtomicBool>,
    sink: &dyn ReportSink,
    progress_callback: Option<DiscoveryProgressCallback>,
) -> Result<DiscoveryReport> {
    let DiscoveryOptions {
        db_path,
        scan,
        gap_limit,
    } = options;

    // Config and probe client are checked before any run row exists, so a
    // bad invocation leaves no bookkeeping behind.
    scan.validate().map_err(DiscoveryError::Scan)?;
    let probe = HttpProbe::new(&scan.base_url, scan.probe_timeout, scan.session_cookie.as_deref())?;

    let store = MappingStore::open(&db_path)?;
    let known = store.known_pairs()?;
    info!(
        "store {} holds {} known mappings",
        db_path.display(),
        known.len()
    );

    let configuration = run_configuration(&scan);
    let run_id = store.create_run(&scan.base_url, Some(&configuration))?;
    let base_url = scan.base_url.clone();

    let store = Arc::new(Mutex::new(store));
    let flush_store = store.clone();
    let flush_run_id = run_id.clone();
    let flush_base_url = base_url.clone();

    let mut engine = DiscoveryEngine::new(probe, scan)?
        .with_known_entries(known)
        .with_cancel_flag(cancel)
        .with_flush_callback(Arc::new(move |batch| {
            let mut store = flush_store.lock().unwrap();
            store
                .insert_batch(&flush_run_id, &flush_base_url, batch)
                .map(|inserted| {
                    if inserted < batch.len() {
                        warn!(
                            "{} of {} flushed discoveries were already present",
                            batch.len() - inserted,
                            batch.len()
                        );
                    }
                })
                .map_err(|e| e.to_string())
        }));

    if let Some(callback) = progress_callback {
        engine = engine.with_progress_callback(callback);
    }

    let outcome = match engine.run().await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("discovery run {} failed: {}", run_id, e);
            let store = store.lock().unwrap();
            store.fail_run(&run_id)?;
            // Batches flushed before the failure are durable; get them out.
            emergency_export(&store, &run_id, gap_limit, sink);
            return Err(DiscoveryError::Scan(e));
        }
    };

    let store = store.lock().unwrap();
    if outcome.cancelled {
        store.cancel_run(&run_id)?;
    } else {
        store.complete_run(&run_id)?;
    }

    let run = store
        .get_run(&run_id)?
        .ok_or(DiscoveryError::Store(rusqlite::Error::QueryReturnedNoRows))?;

    let entries = store.load_all()?;
    let analysis = analyze::analyze(&entries, gap_limit);
    let data = report::gather_report_data(&store, &run, outcome.diagnostics.clone(), analysis.clone())?;

    let json = report::generate_json_report(&data)?;
    let export_path = sink.write(&json)?;
    if let Some(ref path) = export_path {
        info!("exported run {} to {}", run_id, path.display());
    }

    Ok(DiscoveryReport {
        run_id,
        new_entries: data.new_entries.clone(),
        total_entries: entries.len(),
        diagnostics: outcome.diagnostics,
        analysis,
        export_path,
        text_summary: report::generate_text_report(&data),
        cancelled: outcome.cancelled,
    })
}

fn run_configuration(scan: &ScanConfig) -> String {
    serde_json::json!({
        "param_min": scan.param_min,
        "param_max": scan.param_max,
        "key_min": scan.key_min,
        "key_max": scan.key_max,
        "key_window": scan.key_window,
        "concurrency": scan.concurrency,
        "gap_tolerance": scan.gap_tolerance,
        "direction": scan.direction.as_str(),
        "seeds": scan.seeds,
    })
    .to_string()
}

/// Best effort: the run already failed, an export failure on top of that is
/// logged and swallowed so the original error surfaces.
fn emergency_export(store: &MappingStore, run_id: &str, gap_limit: i64, sink: &dyn ReportSink) {
    let result = (|| -> Result<()> {
        let run = store
            .get_run(run_id)?
            .ok_or(DiscoveryError::Store(rusqlite::Error::QueryReturnedNoRows))?;
        let entries = store.load_all()?;
        let analysis = analyze::analyze(&entries, gap_limit);
        let data =
            report::gather_report_data(store, &run, RunDiagnostics::default(), analysis)?;
        let json = report::generate_json_report(&data)?;
        sink.write(&json)?;
        Ok(())
    })();

    match result {
        Ok(()) => warn!("run {} failed; persisted results were still exported", run_id),
        Err(e) => error!("run {} failed and the emergency export failed too: {}", run_id, e),
    }
}
