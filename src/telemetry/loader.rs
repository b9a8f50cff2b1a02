use std::fs;
use std::path::{Path, PathBuf};

use log::warn;

use super::Sample;
use crate::{TracklineError, pipeline::SessionInput};

/// Load one recorded session from a JSON-lines telemetry file. The file stem
/// becomes the session's source label.
pub fn load_session(path: &Path) -> Result<SessionInput, TracklineError> {
    if !path.exists() {
        return Err(TracklineError::InvalidTelemetryFile {
            path: path.to_path_buf(),
        });
    }

    let mut samples = serde_jsonlines::json_lines(path)
        .map_err(|e| TracklineError::SessionLoadError { source: e })?
        .collect::<Result<Vec<Sample>, std::io::Error>>()
        .map_err(|e| TracklineError::SessionLoadError { source: e })?;

    for sample in &mut samples {
        normalize_speed_units(sample);
    }

    let source = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());

    Ok(SessionInput { source, samples })
}

/// Recursively collect `.jsonl` telemetry files under each folder.
pub fn sessions_from_folder(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    collect_jsonl_files(folder, &mut files);
    files.sort();
    files
}

fn collect_jsonl_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("skipping folder {:?}: {}", dir, e);
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_jsonl_files(&path, out);
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"))
        {
            out.push(path);
        }
    }
}

/// Recorders disagree on which speed channels they fill in; derive the
/// missing ones so the rest of the pipeline can rely on m/s being present.
fn normalize_speed_units(sample: &mut Sample) {
    if sample.speed == 0. && sample.speed_kmh > 0. {
        sample.speed = sample.speed_kmh / 3.6;
    }
    if sample.speed == 0. && sample.speed_mph > 0. {
        sample.speed = sample.speed_mph / 2.23694;
    }
    if sample.speed_kmh == 0. && sample.speed > 0. {
        sample.speed_kmh = sample.speed * 3.6;
    }
    if sample.speed_mph == 0. && sample.speed > 0. {
        sample.speed_mph = sample.speed * 2.23694;
    }
}
