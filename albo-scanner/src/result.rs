use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single existence probe. Only `Found` is a positive;
/// `Timeout` and `Error` are NotFound for scan decisions and are kept
/// apart solely for run diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeOutcome {
    Found,
    NotFound,
    Timeout,
    Error,
}

impl ProbeOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, ProbeOutcome::Found)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeOutcome::Found => "found",
            ProbeOutcome::NotFound => "not_found",
            ProbeOutcome::Timeout => "timeout",
            ProbeOutcome::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub param: i64,
    pub key: i64,
    pub outcome: ProbeOutcome,
    pub size_bytes: Option<u64>,
    pub content_type: Option<String>,
    pub probed_at: DateTime<Utc>,
}

impl ProbeResult {
    pub fn found(param: i64, key: i64, size_bytes: Option<u64>, content_type: Option<String>) -> Self {
        Self {
            param,
            key,
            outcome: ProbeOutcome::Found,
            size_bytes,
            content_type,
            probed_at: Utc::now(),
        }
    }

    pub fn missed(param: i64, key: i64, outcome: ProbeOutcome) -> Self {
        Self {
            param,
            key,
            outcome,
            size_bytes: None,
            content_type: None,
            probed_at: Utc::now(),
        }
    }
}

/// A confirmed (param, key) pair. This is the unit handed to the
/// persistence layer; failed probes never become one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discovery {
    pub param: i64,
    pub key: i64,
    pub size_bytes: Option<u64>,
    pub content_type: Option<String>,
    pub probed_at: DateTime<Utc>,
}

impl Discovery {
    pub fn from_probe(result: &ProbeResult) -> Self {
        Self {
            param: result.param,
            key: result.key,
            size_bytes: result.size_bytes,
            content_type: result.content_type.clone(),
            probed_at: result.probed_at,
        }
    }
}

/// Run-scoped probe accounting. Never persisted alongside mappings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunDiagnostics {
    pub probes_total: usize,
    pub found: usize,
    pub not_found: usize,
    pub timeouts: usize,
    pub errors: usize,
    /// Pairs skipped without a network call because the store already had them.
    pub skipped_known: usize,
    pub seed_probes: usize,
    pub seeds_inactive: usize,
}

impl RunDiagnostics {
    pub fn record(&mut self, outcome: ProbeOutcome) {
        match outcome {
            ProbeOutcome::Found => self.found += 1,
            ProbeOutcome::NotFound => self.not_found += 1,
            ProbeOutcome::Timeout => self.timeouts += 1,
            ProbeOutcome::Error => self.errors += 1,
        }
    }

    pub fn merge(&mut self, other: &RunDiagnostics) {
        self.found += other.found;
        self.not_found += other.not_found;
        self.timeouts += other.timeouts;
        self.errors += other.errors;
        self.skipped_known += other.skipped_known;
        self.seed_probes += other.seed_probes;
        self.seeds_inactive += other.seeds_inactive;
    }
}

/// Everything a finished (or cancelled) run produced.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub discoveries: Vec<Discovery>,
    pub diagnostics: RunDiagnostics,
    pub cancelled: bool,
}
