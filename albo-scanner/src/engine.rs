use crate::config::ScanConfig;
use crate::error::{Result, ScanError};
use crate::predict::CandidateGenerator;
use crate::probe::ProbeTransport;
use crate::reference::ReferencePointStore;
use crate::result::{Discovery, RunDiagnostics, ScanOutcome};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Persists one batch of discoveries. Called after every batch so a crash
/// loses at most the unflushed tail. Returning an error aborts the run;
/// batches handed over in earlier calls are already safe.
pub type FlushCallback =
    Arc<dyn Fn(&[Discovery]) -> std::result::Result<(), String> + Send + Sync>;

/// Reports (probes issued so far, discoveries so far) after each batch.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Orchestrates a discovery run: seed validation, the outer param loop,
/// per-param inner key scans, dedup against prior results, bounded
/// concurrency and pacing.
///
/// Scans of different params run concurrently within a batch; a single
/// param's inner scan is sequential because each stop-or-continue decision
/// depends on the previous probe. The semaphore caps in-flight probes, so a
/// slow probe occupies one slot and nothing more.
pub struct DiscoveryEngine<T: ProbeTransport> {
    transport: T,
    config: ScanConfig,
    refs: ReferencePointStore,
    known: HashSet<(i64, i64)>,
    semaphore: Arc<Semaphore>,
    probes_total: AtomicUsize,
    cancel: Arc<AtomicBool>,
    flush_callback: Option<FlushCallback>,
    progress_callback: Option<ProgressCallback>,
}

impl<T: ProbeTransport> std::fmt::Debug for DiscoveryEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: ProbeTransport> DiscoveryEngine<T> {
    /// Validates the configuration before anything else; no network
    /// activity happens on a bad config.
    pub fn new(transport: T, config: ScanConfig) -> Result<Self> {
        config.validate()?;
        let refs = ReferencePointStore::with_seeds(&config.seeds);
        let semaphore = Arc::new(Semaphore::new(config.concurrency));
        Ok(Self {
            transport,
            config,
            refs,
            known: HashSet::new(),
            semaphore,
            probes_total: AtomicUsize::new(0),
            cancel: Arc::new(AtomicBool::new(false)),
            flush_callback: None,
            progress_callback: None,
        })
    }

    /// Seeds the dedup set and the reference points with previously
    /// persisted entries. Known pairs are never probed again during the
    /// scan phase.
    pub fn with_known_entries(mut self, entries: impl IntoIterator<Item = (i64, i64)>) -> Self {
        for (param, key) in entries {
            self.refs.learn(param, key);
            self.known.insert((param, key));
        }
        self
    }

    pub fn with_flush_callback(mut self, callback: FlushCallback) -> Self {
        self.flush_callback = Some(callback);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Setting the flag stops new dispatch; in-flight probes finish within
    /// their timeout and partial results are flushed before `run` returns.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Shares an externally owned cancellation flag (e.g. a signal handler's).
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn probes_issued(&self) -> usize {
        self.probes_total.load(Ordering::Relaxed)
    }

    pub async fn run(&mut self) -> Result<ScanOutcome> {
        info!(
            "starting discovery: params {}..={} {}, {} seeds, {} known pairs, concurrency {}",
            self.config.param_min,
            self.config.param_max,
            self.config.direction.as_str(),
            self.config.seeds.len(),
            self.known.len(),
            self.config.concurrency,
        );

        let mut diagnostics = RunDiagnostics::default();
        let mut all_discoveries: Vec<Discovery> = Vec::new();

        // Phase 1: every reference point is re-probed, bypassing dedup.
        // Inactive seeds are logged, never fatal.
        let seed_discoveries = self.validate_seeds(&mut diagnostics).await;
        for discovery in &seed_discoveries {
            self.known.insert((discovery.param, discovery.key));
        }
        self.flush(&seed_discoveries)?;
        all_discoveries.extend(seed_discoveries);

        // Phase 2: outer loop over the param range, one batch of
        // concurrently scanned params at a time.
        let params = self.config.params();
        let mut cancelled = false;

        for batch in params.chunks(self.config.concurrency) {
            if self.cancel.load(Ordering::Relaxed) {
                warn!("cancellation requested, stopping dispatch");
                cancelled = true;
                break;
            }

            // Predictions are snapshotted before dispatch; reference points
            // are only updated at the accumulation point below.
            let jobs: Vec<(i64, Vec<i64>)> = {
                let generator = CandidateGenerator::new(&self.refs, &self.config);
                batch.iter().map(|&p| (p, generator.predict(p))).collect()
            };

            let mut scans = Vec::with_capacity(jobs.len());
            for (param, candidates) in jobs {
                scans.push(self.scan_param(param, candidates));
            }
            let results = join_all(scans).await;

            let mut batch_discoveries = Vec::new();
            for (found, scan_diag) in results {
                diagnostics.merge(&scan_diag);
                batch_discoveries.extend(found);
            }

            for discovery in &batch_discoveries {
                self.refs.learn(discovery.param, discovery.key);
                self.known.insert((discovery.param, discovery.key));
            }

            self.flush(&batch_discoveries)?;
            all_discoveries.extend(batch_discoveries);

            if let Some(ref callback) = self.progress_callback {
                callback(self.probes_issued(), all_discoveries.len());
            }

            if !self.config.batch_pause.is_zero() {
                tokio::time::sleep(self.config.batch_pause).await;
            }
        }

        cancelled = cancelled || self.cancel.load(Ordering::Relaxed);
        diagnostics.probes_total = self.probes_issued();

        info!(
            "discovery finished: {} probes, {} discoveries, {} params with hits{}",
            diagnostics.probes_total,
            all_discoveries.len(),
            self.refs.len(),
            if cancelled { " (cancelled)" } else { "" },
        );

        Ok(ScanOutcome {
            discoveries: all_discoveries,
            diagnostics,
            cancelled,
        })
    }

    async fn validate_seeds(&self, diagnostics: &mut RunDiagnostics) -> Vec<Discovery> {
        let mut discoveries = Vec::new();

        for seed in &self.config.seeds {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }

            let result = self.probe_one(seed.param, seed.key).await;
            diagnostics.seed_probes += 1;
            diagnostics.record(result.outcome);

            if result.outcome.is_found() {
                debug!("seed ({}, {}) still active", seed.param, seed.key);
                if !self.known.contains(&(seed.param, seed.key)) {
                    discoveries.push(Discovery::from_probe(&result));
                }
            } else {
                diagnostics.seeds_inactive += 1;
                warn!(
                    "seed ({}, {}) no longer valid, continuing discovery",
                    seed.param, seed.key
                );
            }
        }

        discoveries
    }

    /// Inner scan for one param: walk the key window around each candidate
    /// start, stopping once the consecutive-failure gap is exceeded and at
    /// least one hit exists for this param. A later candidate is tried only
    /// when the previous ones produced nothing; the same pair is never
    /// probed twice in a run.
    async fn scan_param(&self, param: i64, candidates: Vec<i64>) -> (Vec<Discovery>, RunDiagnostics) {
        let mut diag = RunDiagnostics::default();
        let mut found: Vec<Discovery> = Vec::new();
        let mut attempted: HashSet<i64> = HashSet::new();
        let mut consecutive_failures: u32 = 0;
        let mut hit_any = false;

        debug!("scanning param {} from {} candidate starts", param, candidates.len());

        'candidates: for start in candidates {
            for key in (start - self.config.key_window)..=(start + self.config.key_window) {
                if !self.config.in_key_bounds(key) {
                    continue;
                }
                if self.cancel.load(Ordering::Relaxed) {
                    break 'candidates;
                }
                if self.known.contains(&(param, key)) {
                    // Already persisted: counts as a hit for gap accounting,
                    // costs no network call.
                    diag.skipped_known += 1;
                    consecutive_failures = 0;
                    hit_any = true;
                    continue;
                }
                if !attempted.insert(key) {
                    continue;
                }

                let result = self.probe_one(param, key).await;
                diag.record(result.outcome);

                if result.outcome.is_found() {
                    debug!("key {} -> param {}", key, param);
                    consecutive_failures = 0;
                    hit_any = true;
                    found.push(Discovery::from_probe(&result));
                } else {
                    consecutive_failures += 1;
                    if consecutive_failures > self.config.gap_tolerance && hit_any {
                        break 'candidates;
                    }
                }
            }

            if hit_any {
                break;
            }
        }

        if !found.is_empty() {
            debug!("param {}: {} new keys", param, found.len());
        }

        (found, diag)
    }

    async fn probe_one(&self, param: i64, key: i64) -> crate::result::ProbeResult {
        let _permit = self.semaphore.acquire().await.unwrap();
        self.probes_total.fetch_add(1, Ordering::Relaxed);
        self.transport.probe(param, key).await
    }

    fn flush(&self, batch: &[Discovery]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        if let Some(ref callback) = self.flush_callback {
            callback(batch).map_err(ScanError::StoreError)?;
            debug!("flushed {} discoveries", batch.len());
        }
        Ok(())
    }
}
