// Library interface for trackline
// This allows integration tests to access internal modules

pub mod errors;
pub mod pipeline;
pub mod telemetry;
pub mod track;
pub mod writer;

// Re-export commonly used types
pub use errors::TracklineError;
pub use pipeline::{AnalysisDocument, RunParams, SessionInput};
pub use telemetry::Sample;
pub use track::{RunKind, Trackpoint};
