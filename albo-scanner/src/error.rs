use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Persistence failed: {0}")]
    StoreError(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
