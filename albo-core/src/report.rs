// Report generation from the mapping store

use crate::analyze::PatternAnalysis;
use crate::data::{MappingStore, ScanRun};
use crate::error::Result;
use crate::model::MappingEntry;
use albo_scanner::RunDiagnostics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

/// Where a rendered report goes. Chosen by the caller; the exporter never
/// invents destinations on its own.
pub trait ReportSink {
    fn write(&self, content: &str) -> Result<Option<PathBuf>>;
}

pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReportSink for FileSink {
    fn write(&self, content: &str) -> Result<Option<PathBuf>> {
        let mut file = File::create(&self.path)?;
        file.write_all(content.as_bytes())?;
        Ok(Some(self.path.clone()))
    }
}

pub struct StdoutSink;

impl ReportSink for StdoutSink {
    fn write(&self, content: &str) -> Result<Option<PathBuf>> {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(content.as_bytes())?;
        Ok(None)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub run_id: String,
    pub status: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub base_url: String,
    /// Entire corpus, params descending with keys ascending.
    pub entries: Vec<MappingEntry>,
    /// Entries first seen by this run, same ordering.
    pub new_entries: Vec<MappingEntry>,
    pub diagnostics: RunDiagnostics,
    pub analysis: PatternAnalysis,
}

pub fn gather_report_data(
    store: &MappingStore,
    run: &ScanRun,
    diagnostics: RunDiagnostics,
    analysis: PatternAnalysis,
) -> Result<ReportData> {
    let entries = store.load_all()?;
    let new_entries = store.entries_for_run(&run.id)?;

    Ok(ReportData {
        run_id: run.id.clone(),
        status: run.status.clone(),
        start_time: run.start_time,
        end_time: run.end_time,
        base_url: run.base_url.clone(),
        entries,
        new_entries,
        diagnostics,
        analysis,
    })
}

pub fn generate_json_report(data: &ReportData) -> std::result::Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "albo",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "run": {
                "id": data.run_id,
                "status": data.status,
                "start_time": format_iso8601_timestamp(data.start_time),
                "end_time": data.end_time.map(format_iso8601_timestamp),
                "duration_seconds": data.end_time.map(|end| end - data.start_time),
                "base_url": data.base_url
            },
            "summary": {
                "total_mappings": data.entries.len(),
                "new_mappings": data.new_entries.len(),
                "probes": {
                    "total": data.diagnostics.probes_total,
                    "found": data.diagnostics.found,
                    "not_found": data.diagnostics.not_found,
                    "timeouts": data.diagnostics.timeouts,
                    "errors": data.diagnostics.errors,
                    "skipped_known": data.diagnostics.skipped_known,
                    "seed_probes": data.diagnostics.seed_probes,
                    "seeds_inactive": data.diagnostics.seeds_inactive
                }
            },
            "pattern_analysis": data.analysis,
            "mappings": mappings_by_param(&data.entries),
            "new_entries": data.new_entries
        }
    });

    serde_json::to_string_pretty(&json_report)
}

/// Groups the corpus as param → entries, rendered params descending.
fn mappings_by_param(entries: &[MappingEntry]) -> Vec<serde_json::Value> {
    let mut grouped: BTreeMap<i64, Vec<&MappingEntry>> = BTreeMap::new();
    for entry in entries {
        grouped.entry(entry.param).or_default().push(entry);
    }

    grouped
        .iter()
        .rev()
        .map(|(param, group)| {
            serde_json::json!({
                "param": param,
                "keys": group.iter().map(|e| e.key).collect::<Vec<_>>(),
                "entries": group
            })
        })
        .collect()
}

pub fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();

    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    report.push_str("                          ALBO DISCOVERY RUN REPORT\n");
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    report.push_str(&format!("Run ID:       {}\n", data.run_id));
    report.push_str(&format!("Status:       {}\n", status_label(&data.status)));
    report.push_str(&format!("Scan Date:    {}\n", format_timestamp(data.start_time)));

    if let Some(end_time) = data.end_time {
        let duration = end_time - data.start_time;
        report.push_str(&format!("Duration:     {} seconds\n", duration));
    }

    report.push_str(&format!("Endpoint:     {}\n", data.base_url));
    report.push_str(&format!("Mappings:     {} total, {} new this run\n", data.entries.len(), data.new_entries.len()));
    report.push('\n');

    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    report.push_str("PROBE SUMMARY\n");
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    let d = &data.diagnostics;
    report.push_str(&format!("Probes Issued:   {}\n", d.probes_total));
    report.push_str(&format!("  Found:         {}\n", d.found));
    report.push_str(&format!("  Not Found:     {}\n", d.not_found));
    if d.timeouts > 0 {
        report.push_str(&format!("  Timeouts:      {}\n", d.timeouts));
    }
    if d.errors > 0 {
        report.push_str(&format!("  Errors:        {}\n", d.errors));
    }
    report.push_str(&format!("Skipped (known): {}\n", d.skipped_known));
    report.push_str(&format!("Seed Probes:     {} ({} inactive)\n", d.seed_probes, d.seeds_inactive));
    report.push('\n');

    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    report.push_str("PATTERN ANALYSIS\n");
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    let a = &data.analysis;
    report.push_str(&format!("Params:       {} distinct", a.total_params));
    if let (Some(lo), Some(hi)) = (a.param_min, a.param_max) {
        report.push_str(&format!(" (range {}..{}, span {})", lo, hi, a.param_span));
    }
    report.push('\n');
    report.push_str(&format!("Keys:         {} entries", a.total_entries));
    if let (Some(lo), Some(hi)) = (a.key_min, a.key_max) {
        report.push_str(&format!(" (range {}..{}, span {})", lo, hi, a.key_span));
    }
    report.push('\n');
    report.push_str(&format!(
        "Sequential:   {} of {} consecutive param pairs\n",
        a.sequential_count,
        a.patterns.len()
    ));
    report.push('\n');

    if !data.new_entries.is_empty() {
        report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
        report.push_str("NEW MAPPINGS\n");
        report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

        for entry in &data.new_entries {
            let size = entry
                .size_bytes
                .map(|s| format!("{} bytes", s))
                .unwrap_or_else(|| "size unknown".to_string());
            let kind = entry.content_type.as_deref().unwrap_or("?");
            report.push_str(&format!(
                "  param {:>8}  key {:>8}  [{} / {}]\n",
                entry.param, entry.key, kind, size
            ));
        }
        report.push('\n');
    }

    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    report.push_str("                          End of Report\n");
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    report
}

fn status_label(status: &str) -> &'static str {
    match status {
        "completed" => "Completed",
        "failed" => "Failed",
        "running" => "Running",
        "cancelled" => "Cancelled",
        _ => "Unknown",
    }
}

fn format_timestamp(timestamp: i64) -> String {
    use chrono::{DateTime, Utc};
    let datetime = DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or_else(Utc::now);
    datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn format_iso8601_timestamp(timestamp: i64) -> String {
    use chrono::{DateTime, Utc};
    let datetime = DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or_else(Utc::now);
    datetime.to_rfc3339()
}
