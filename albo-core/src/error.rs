use albo_scanner::ScanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("mapping store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("export failed: {0}")]
    ExportIo(#[from] std::io::Error),

    #[error("export serialization failed: {0}")]
    ExportJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
