pub mod config;
pub mod engine;
pub mod error;
pub mod predict;
pub mod probe;
pub mod reference;
pub mod result;

pub use config::{ScanConfig, ScanDirection};
pub use engine::{DiscoveryEngine, FlushCallback, ProgressCallback};
pub use error::ScanError;
pub use predict::CandidateGenerator;
pub use probe::{HttpProbe, ProbeTransport};
pub use reference::{ReferencePoint, ReferencePointStore};
pub use result::{Discovery, ProbeOutcome, ProbeResult, RunDiagnostics, ScanOutcome};
