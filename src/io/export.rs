//! Emit run results.
//!
//! - JSON: the full `RunOutput` (metadata + entities), written to a sibling
//!   temporary file and persisted over the target only once complete
//! - CSV: a flat per-entity table for spreadsheets

use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::domain::{EnrichedEntity, RunOutput};
use crate::error::AppError;

/// Write the run output as pretty JSON.
///
/// The temporary file lives next to `path` so the final rename stays on one
/// filesystem. It is removed on drop if anything fails before `persist`.
pub fn write_output_json(path: &Path, output: &RunOutput) -> Result<(), AppError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|e| AppError::new(4, format!("Failed to create output JSON in '{}': {e}", dir.display())))?;

    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, output)
            .map_err(|e| AppError::new(4, format!("Failed to write output JSON: {e}")))?;
        writer
            .flush()
            .map_err(|e| AppError::new(4, format!("Failed to flush output JSON: {e}")))?;
    }

    tmp.persist(path)
        .map_err(|e| AppError::new(4, format!("Failed to move output JSON into '{}': {e}", path.display())))?;
    Ok(())
}

/// Write the entities as a flat CSV table.
pub fn write_entities_csv(path: &Path, entities: &[EnrichedEntity]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(4, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    writer
        .write_record(["name", "rating", "type", "date", "nursery", "lat", "lon"])
        .map_err(|e| AppError::new(4, format!("Failed to write export CSV header: {e}")))?;

    for entity in entities {
        let lat = format!("{:.6}", entity.lat);
        let lon = format!("{:.6}", entity.lon);
        writer
            .write_record([
                entity.name.as_str(),
                entity.rating.label(),
                entity.kind.as_str(),
                entity.date.as_str(),
                if entity.nursery { "true" } else { "false" },
                lat.as_str(),
                lon.as_str(),
            ])
            .map_err(|e| AppError::new(4, format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(4, format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DatumMode, Rating, RunMetadata, SkipCounts, SkipReason};
    use chrono::Utc;
    use std::fs;

    fn sample_output() -> RunOutput {
        let mut skip_counts = SkipCounts::default();
        skip_counts.record(SkipReason::Inactive);
        RunOutput {
            metadata: RunMetadata {
                generated_at: Utc::now(),
                total_count: 1,
                rows_read: 2,
                skip_counts,
                degraded: None,
                datum: DatumMode::Airy,
            },
            entities: vec![EnrichedEntity {
                name: "Holt".to_string(),
                rating: Rating::Outstanding,
                kind: "Secondary".to_string(),
                date: "15-11-2023".to_string(),
                nursery: false,
                lat: 51.413,
                lon: -0.845,
            }],
        }
    }

    #[test]
    fn json_output_is_written_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schools.json");
        let output = sample_output();

        write_output_json(&path, &output).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let back: RunOutput = serde_json::from_str(&text).unwrap();
        assert_eq!(back, output);

        let raw: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(raw["metadata"]["totalCount"], 1);
        assert_eq!(raw["metadata"]["skipCounts"]["inactive"], 1);
        assert!(raw["metadata"]["generatedAt"].is_string());
        assert!(raw["metadata"].get("degraded").is_none());
        assert_eq!(raw["entities"][0]["type"], "Secondary");
    }

    #[test]
    fn json_overwrite_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schools.json");
        fs::write(&path, "stale").unwrap();

        write_output_json(&path, &sample_output()).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("schools.json")]);
        assert!(fs::read_to_string(&path).unwrap().starts_with('{'));
    }

    #[test]
    fn json_write_into_missing_dir_fails_cleanly() {
        let path = Path::new("/definitely/not/here/schools.json");
        let err = write_output_json(path, &sample_output()).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(!path.exists());
    }

    #[test]
    fn csv_export_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schools.csv");
        write_entities_csv(&path, &sample_output().entities).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("name,rating,type,date,nursery,lat,lon"));
        assert_eq!(
            lines.next(),
            Some("Holt,Outstanding,Secondary,15-11-2023,false,51.413000,-0.845000")
        );
    }
}
