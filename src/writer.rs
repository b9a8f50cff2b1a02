use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use crate::errors::TracklineError;
use crate::pipeline::AnalysisDocument;

/// Serializes the analysis document as pretty-printed JSON, to a file when a
/// path is given, to stdout otherwise.
pub fn write_document(
    document: &AnalysisDocument,
    output: Option<&Path>,
) -> Result<(), TracklineError> {
    match output {
        Some(path) => {
            let file =
                File::create(path).map_err(|e| TracklineError::WriterError { source: e })?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, document)
                .map_err(|e| TracklineError::OutputSerializeError { source: e })?;
            writer
                .flush()
                .map_err(|e| TracklineError::WriterError { source: e })?;
            log::info!("wrote analysis to {}", path.display());
        }
        None => {
            let mut writer = BufWriter::new(io::stdout().lock());
            serde_json::to_writer_pretty(&mut writer, document)
                .map_err(|e| TracklineError::OutputSerializeError { source: e })?;
            writeln!(writer).map_err(|e| TracklineError::WriterError { source: e })?;
            writer
                .flush()
                .map_err(|e| TracklineError::WriterError { source: e })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::MasterPoint;

    #[test]
    fn test_written_file_parses_back() {
        let document = AnalysisDocument {
            master: vec![MasterPoint {
                rel_s: 0.,
                x: 1.,
                y: 2.,
                surface: None,
            }],
            race_type: Some("sprint".to_string()),
            ..Default::default()
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.json");
        write_document(&document, Some(&path)).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let back: AnalysisDocument = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.master.len(), 1);
        assert_eq!(back.race_type.as_deref(), Some("sprint"));
    }

    #[test]
    fn test_unwritable_path_reports_writer_error() {
        let document = AnalysisDocument::default();
        let err = write_document(&document, Some(Path::new("/nonexistent/dir/analysis.json")))
            .unwrap_err();
        assert!(matches!(err, TracklineError::WriterError { .. }));
    }
}
