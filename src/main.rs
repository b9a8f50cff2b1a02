use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use trackline::errors::TracklineError;
use trackline::pipeline::{RunParams, analyze_sessions};
use trackline::telemetry::{load_session, sessions_from_folder};
use trackline::track::EventThresholds;
use trackline::writer::write_document;

#[derive(Parser, Debug)]
#[command(version, about = "Rebuilds track geometry and race analytics from recorded telemetry")]
struct Args {
    /// Telemetry session file in JSON Lines format (repeatable)
    #[arg(short, long)]
    file: Vec<PathBuf>,

    /// Folder scanned recursively for session files (repeatable)
    #[arg(short = 'd', long)]
    folder: Vec<PathBuf>,

    /// Expected lap length in meters (autodetected when omitted)
    #[arg(long)]
    lap_length: Option<f64>,

    /// Tolerance for lap length matching (meters)
    #[arg(long, default_value_t = 25.0)]
    lap_tol: f64,

    /// Radius (m) around the start point that counts as a start/finish crossing
    #[arg(long, default_value_t = 10.0)]
    start_finish_radius: f64,

    /// Known lap count; detected laps beyond it are trimmed
    #[arg(long)]
    lap_count: Option<usize>,

    /// Minimum distance (m) between lap boundaries
    #[arg(long, default_value_t = 200.0)]
    min_lap_spacing: f64,

    /// Resampled points in the master geometry
    #[arg(long, default_value_t = 4000)]
    master_samples: usize,

    /// Treat input as a point-to-point sprint instead of a lapped race
    #[arg(long, default_value_t = false)]
    sprint: bool,

    /// Sectors per lap for timing metrics
    #[arg(long, default_value_t = 3)]
    sectors: usize,

    /// Write JSON to this file instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,
}

fn run(args: &Args) -> Result<(), TracklineError> {
    let mut paths = args.file.clone();
    for folder in &args.folder {
        paths.extend(sessions_from_folder(folder));
    }
    if paths.is_empty() {
        return Err(TracklineError::NoUsableSessions);
    }
    log::info!("input files: {}", paths.len());

    let mut sessions = Vec::new();
    for path in &paths {
        match load_session(path) {
            Ok(session) => sessions.push(session),
            Err(err) => log::warn!("skipping {}: {err}", path.display()),
        }
    }

    let params = RunParams {
        expected_lap_length: args.lap_length.filter(|&v| v > 0.),
        lap_tolerance: args.lap_tol,
        lap_count: args.lap_count.filter(|&c| c > 0),
        min_lap_spacing: args.min_lap_spacing,
        start_finish_radius: args.start_finish_radius,
        master_samples: args.master_samples,
        force_sprint: args.sprint,
        sectors: args.sectors,
        event_thresholds: EventThresholds::default(),
    };

    let document = analyze_sessions(sessions, &params)?;
    write_document(&document, args.out.as_deref())
}

fn main() -> ExitCode {
    colog::init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
