use albo_scanner::Discovery;
use serde::{Deserialize, Serialize};

/// A persisted (param, key) mapping. Entries are append-only and immutable
/// once written; only Found probes ever become one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub param: i64,
    pub key: i64,
    pub size_bytes: Option<i64>,
    pub content_type: Option<String>,
    /// Fully addressed file URL for the pair.
    pub url: String,
    /// Unix timestamp of the probe that discovered the pair.
    pub discovered_at: i64,
    /// Id of the scan run that first saw the pair.
    pub source_run: String,
}

impl MappingEntry {
    pub fn from_discovery(discovery: &Discovery, base_url: &str, source_run: &str) -> Self {
        Self {
            param: discovery.param,
            key: discovery.key,
            size_bytes: discovery.size_bytes.map(|v| v as i64),
            content_type: discovery.content_type.clone(),
            url: file_url(base_url, discovery.param, discovery.key),
            discovered_at: discovery.probed_at.timestamp(),
            source_run: source_run.to_string(),
        }
    }
}

/// Canonical file URL for a (param, key) pair, matching what the probe hits.
pub fn file_url(base_url: &str, param: i64, key: i64) -> String {
    match url::Url::parse(base_url) {
        Ok(mut url) => {
            url.query_pairs_mut()
                .append_pair("SOURCE", "DB")
                .append_pair("PARAM", &param.to_string())
                .append_pair("KEY", &key.to_string());
            url.to_string()
        }
        // Store callers validated the base URL already; keep the row usable.
        Err(_) => format!("{}?SOURCE=DB&PARAM={}&KEY={}", base_url, param, key),
    }
}
