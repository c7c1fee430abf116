use crate::error::{Result, ScanError};
use crate::reference::ReferencePoint;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Order in which the param range is walked. Source data assigns higher
/// param ids to more recent records, so descending reaches new material
/// first; both orders are supported and neither is privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanDirection {
    Ascending,
    Descending,
}

impl ScanDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanDirection::Ascending => "ascending",
            ScanDirection::Descending => "descending",
        }
    }
}

/// Everything a run needs, supplied by the caller. One engine, parameterized
/// by this value object; there are no baked-in defaults.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Endpoint probed with `?SOURCE=DB&PARAM=<param>&KEY=<key>`.
    pub base_url: String,
    /// Session cookie carried on every probe, e.g. "ASP.NET_SessionId=...".
    pub session_cookie: Option<String>,
    pub seeds: Vec<ReferencePoint>,
    pub param_min: i64,
    pub param_max: i64,
    /// Sanity bound for candidate keys; anything outside is dropped silently.
    pub key_min: i64,
    pub key_max: i64,
    /// Keys probed on each side of a candidate start.
    pub key_window: i64,
    /// Maximum simultaneous in-flight probes.
    pub concurrency: usize,
    pub probe_timeout: Duration,
    /// Consecutive misses tolerated after the first hit before a param's
    /// inner scan gives up. Historical runs used 5, 10, 15 and 20.
    pub gap_tolerance: u32,
    pub direction: ScanDirection,
    /// Pause between batches to stay under remote rate limits.
    pub batch_pause: Duration,
    /// Cap on candidate starts per param.
    pub max_candidates: usize,
    /// Static key list tried when no reference points exist at all.
    pub fallback_keys: Vec<i64>,
}

impl ScanConfig {
    /// Fails fast, before any network activity.
    pub fn validate(&self) -> Result<()> {
        if self.param_min > self.param_max {
            return Err(ScanError::ConfigError(format!(
                "param range inverted: {} > {}",
                self.param_min, self.param_max
            )));
        }
        if self.key_min > self.key_max {
            return Err(ScanError::ConfigError(format!(
                "key range inverted: {} > {}",
                self.key_min, self.key_max
            )));
        }
        if self.concurrency == 0 {
            return Err(ScanError::ConfigError("concurrency must be at least 1".to_string()));
        }
        if self.key_window < 1 {
            return Err(ScanError::ConfigError("key window must be at least 1".to_string()));
        }
        if self.max_candidates == 0 {
            return Err(ScanError::ConfigError("max candidates must be at least 1".to_string()));
        }
        Ok(())
    }

    /// The param range in scan order.
    pub fn params(&self) -> Vec<i64> {
        let range = self.param_min..=self.param_max;
        match self.direction {
            ScanDirection::Ascending => range.collect(),
            ScanDirection::Descending => range.rev().collect(),
        }
    }

    pub fn in_key_bounds(&self, key: i64) -> bool {
        key >= self.key_min && key <= self.key_max
    }
}
