// Error types for trackline

use snafu::Snafu;
use std::{io, path::PathBuf};

#[derive(Debug, Snafu)]
pub enum TracklineError {
    // Errors while loading recorded sessions
    #[snafu(display("Invalid telemetry file: {path:?}"))]
    InvalidTelemetryFile { path: PathBuf },
    #[snafu(display("Error loading telemetry file"))]
    SessionLoadError { source: io::Error },

    // Errors from the reconstruction pipeline
    #[snafu(display("Not enough samples to reconstruct a path ({count} < 2)"))]
    NotEnoughSamples { count: usize },
    #[snafu(display("No lap boundaries detected for session {source_name}"))]
    NoLapsDetected { source_name: String },
    #[snafu(display("Master path could not be built from the available laps"))]
    MasterUnavailable,
    #[snafu(display("No usable sessions left after reconstruction; nothing to analyze"))]
    NoUsableSessions,

    // Errors for the result writer
    #[snafu(display("Error writing analysis output"))]
    WriterError { source: io::Error },
    #[snafu(display("Error serializing analysis output"))]
    OutputSerializeError { source: serde_json::Error },
}
