pub mod analyze;
pub mod data;
pub mod discover;
pub mod error;
pub mod model;
pub mod report;

pub use analyze::{PatternAnalysis, SequentialPattern, analyze};
pub use data::{MappingStore, ScanRun};
pub use discover::{DiscoveryOptions, DiscoveryReport, execute_discovery};
pub use error::DiscoveryError;
pub use model::MappingEntry;
pub use report::{FileSink, ReportSink, StdoutSink};
