//! Shared "build" pipeline used by the CLI and by library callers.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load primary -> load secondary -> resolve schemas -> merge -> normalize -> collect
//!
//! Only a failure to load the primary dataset is fatal. Everything after that
//! point degrades or skips instead of failing, so a run that gets past the
//! primary load always produces exactly one `RunOutput`.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::data::DatasetFetcher;
use crate::domain::{DatasetKind, DatumMode, Degradation, PipelineConfig, RunMetadata, RunOutput};
use crate::error::AppError;
use crate::io::ingest::Dataset;
use crate::merge::{SecondaryView, merge};
use crate::normalize::{NormalizeOptions, RecordNormalizer};
use crate::schema::{CandidateTable, SchemaProjection};

/// Fetch both datasets named by `config` and run the pipeline over them.
pub fn run_build(config: &PipelineConfig) -> Result<RunOutput, AppError> {
    let fetcher = DatasetFetcher::new()?;

    // 1) Primary dataset: fatal on failure.
    let primary = fetcher.load(&config.primary)?;

    // 2) Secondary dataset: any failure degrades the run.
    let secondary = match &config.secondary {
        None => Err(Degradation::SecondaryMissing),
        Some(source) => fetcher.load(source).map_err(|e| {
            warn!(source = %source, error = %e, "secondary dataset unavailable; continuing primary-only");
            Degradation::SecondaryUnreadable {
                message: e.message().to_string(),
            }
        }),
    };

    let options = NormalizeOptions {
        open_marker: config.open_marker.clone(),
        datum: config.datum,
    };

    Ok(run_with_datasets(&primary, secondary.as_ref().map_err(Clone::clone), &options))
}

/// Run the pipeline over already-loaded datasets.
pub fn run_with_datasets(
    primary: &Dataset,
    secondary: Result<&Dataset, Degradation>,
    options: &NormalizeOptions,
) -> RunOutput {
    run_with_candidates(primary, secondary, options, &CandidateTable::default())
}

/// [`run_with_datasets`] with a caller-supplied candidate table.
pub fn run_with_candidates(
    primary: &Dataset,
    secondary: Result<&Dataset, Degradation>,
    options: &NormalizeOptions,
    candidates: &CandidateTable,
) -> RunOutput {
    if options.datum == DatumMode::Wgs84 {
        warn!("WGS84 datum shift enabled; coordinates diverge from ellipsoid-only reference outputs by ~100 m");
    }

    if primary.is_empty() {
        warn!(dataset = %primary.label, "primary dataset has no rows");
    }

    // 3) Resolve schemas once per dataset, never per row.
    let primary_schema = SchemaProjection::resolve(DatasetKind::Primary, primary, candidates);
    log_schema(&primary_schema);

    let secondary_schema = secondary
        .as_ref()
        .ok()
        .map(|ds| SchemaProjection::resolve(DatasetKind::Secondary, ds, candidates));
    if let Some(schema) = &secondary_schema {
        log_schema(schema);
    }

    let secondary_view = match (secondary, &secondary_schema) {
        (Ok(dataset), Some(schema)) => Ok(SecondaryView { dataset, schema }),
        (Err(reason), _) => Err(reason),
        (Ok(_), None) => Err(Degradation::SecondaryMissing),
    };

    // 4) Left-join on the identifier.
    let merged = merge(primary, &primary_schema, secondary_view);
    info!(
        rows = merged.rows.len(),
        matched = merged.matched,
        duplicate_keys = merged.duplicate_keys,
        degraded = merged.degraded.is_some(),
        "datasets merged"
    );

    // 5) Normalize every joined row.
    let normalizer = RecordNormalizer::new(&primary_schema, options.clone());
    let (entities, skip_counts) = normalizer.normalize_all(&merged.rows);

    for (reason, count) in skip_counts.iter() {
        info!(reason = %reason, count, "rows skipped");
    }
    info!(entities = entities.len(), rows_read = primary.len(), "normalization complete");

    RunOutput {
        metadata: RunMetadata {
            generated_at: Utc::now(),
            total_count: entities.len(),
            rows_read: primary.len(),
            skip_counts,
            degraded: merged.degraded,
            datum: options.datum,
        },
        entities,
    }
}

fn log_schema(schema: &SchemaProjection) {
    for (role, header) in schema.resolved() {
        debug!(dataset = %schema.dataset(), role = %role, header, "column resolved");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ColumnRole, DatasetSource, Rating, SkipReason};

    fn gias() -> Dataset {
        Dataset::from_parts(
            "gias",
            ["URN", "EstablishmentName", "EstablishmentStatus (name)", "PhaseOfEducation (name)", "Easting", "Northing"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            vec![
                vec!["100001".into(), "The Holt School".into(), "Open".into(), "Secondary".into(), "480000".into(), "170000".into()],
                vec!["100002".into(), "Old School".into(), "Closed".into(), "Primary".into(), "480100".into(), "170100".into()],
                vec!["100003".into(), "Nowhere Primary".into(), "Open".into(), "Primary".into(), "0".into(), "0".into()],
            ],
        )
    }

    fn ofsted() -> Dataset {
        Dataset::from_parts(
            "ofsted",
            vec!["URN".into(), "Overall effectiveness".into(), "Inspection end date".into()],
            vec![vec!["100001.0".into(), "1".into(), "15/11/2023".into()]],
        )
    }

    #[test]
    fn end_to_end_three_row_scenario() {
        let primary = gias();
        let secondary = ofsted();
        let out = run_with_datasets(&primary, Ok(&secondary), &NormalizeOptions::default());

        assert_eq!(out.entities.len(), 1);
        assert_eq!(out.metadata.total_count, 1);
        assert_eq!(out.metadata.rows_read, 3);
        assert!(out.metadata.degraded.is_none());

        let entity = &out.entities[0];
        assert_eq!(entity.name, "Holt School");
        assert_eq!(entity.rating, Rating::Outstanding);
        assert_eq!(entity.date, "15-11-2023");

        assert_eq!(out.metadata.skip_counts.get(SkipReason::Inactive), 1);
        assert_eq!(out.metadata.skip_counts.get(SkipReason::NoCoordinates), 1);
        assert_eq!(out.metadata.skip_counts.total(), 2);

        let json = serde_json::to_value(&out.metadata.skip_counts).unwrap();
        assert_eq!(json, serde_json::json!({"inactive": 1, "no-coordinates": 1}));
    }

    #[test]
    fn unmatched_primary_row_survives_with_unknown_rating() {
        let primary = gias();
        let secondary = Dataset::from_parts(
            "ofsted",
            vec!["URN".into(), "Overall effectiveness".into()],
            vec![vec!["999999".into(), "1".into()]],
        );
        let out = run_with_datasets(&primary, Ok(&secondary), &NormalizeOptions::default());

        assert_eq!(out.entities.len(), 1);
        assert_eq!(out.entities[0].rating, Rating::Unknown);
        assert_eq!(out.entities[0].date, "N/A");
        assert!(out.metadata.degraded.is_none());
    }

    #[test]
    fn missing_secondary_degrades_and_is_recorded() {
        let primary = gias();
        let out = run_with_datasets(&primary, Err(Degradation::SecondaryMissing), &NormalizeOptions::default());

        assert_eq!(out.entities.len(), 1);
        assert_eq!(out.entities[0].rating, Rating::Unknown);
        assert_eq!(out.metadata.degraded, Some(Degradation::SecondaryMissing));
    }

    #[test]
    fn secondary_without_rating_column_degrades() {
        let primary = gias();
        let secondary = Dataset::from_parts("ofsted", vec!["URN".into()], vec![vec!["100001".into()]]);
        let out = run_with_datasets(&primary, Ok(&secondary), &NormalizeOptions::default());

        assert_eq!(
            out.metadata.degraded,
            Some(Degradation::MissingColumn {
                dataset: DatasetKind::Secondary,
                role: ColumnRole::RatingCode,
            })
        );
        assert_eq!(out.entities[0].rating, Rating::Unknown);
    }

    #[test]
    fn output_preserves_input_order() {
        let primary = Dataset::from_parts(
            "gias",
            vec!["URN".into(), "EstablishmentName".into(), "EstablishmentStatus (name)".into(), "Latitude".into(), "Longitude".into()],
            vec![
                vec!["3".into(), "C".into(), "Open".into(), "51.3".into(), "-0.3".into()],
                vec!["1".into(), "A".into(), "Open".into(), "51.1".into(), "-0.1".into()],
                vec!["2".into(), "B".into(), "Open".into(), "51.2".into(), "-0.2".into()],
            ],
        );
        let out = run_with_datasets(&primary, Err(Degradation::SecondaryMissing), &NormalizeOptions::default());
        let names: Vec<&str> = out.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn custom_candidates_drive_resolution() {
        let primary = Dataset::from_parts(
            "custom",
            vec!["id".into(), "state".into(), "lat".into(), "lng".into()],
            vec![vec!["1".into(), "Open".into(), "51.5".into(), "-0.1".into()]],
        );
        let candidates = CandidateTable::default()
            .with(ColumnRole::Identifier, ["id"])
            .with(ColumnRole::Status, ["state"])
            .with(ColumnRole::Latitude, ["lat"])
            .with(ColumnRole::Longitude, ["lng"]);
        let out = run_with_candidates(&primary, Err(Degradation::SecondaryMissing), &NormalizeOptions::default(), &candidates);
        assert_eq!(out.entities.len(), 1);
        assert_eq!(out.entities[0].lat, 51.5);
    }

    #[test]
    fn missing_primary_is_fatal() {
        let config = PipelineConfig {
            primary: DatasetSource::File("/definitely/not/here.csv".into()),
            secondary: None,
            out: None,
            export_csv: None,
            datum: DatumMode::Airy,
            open_marker: "Open".to_string(),
        };
        let err = run_build(&config).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn unreadable_secondary_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gias.csv");
        std::fs::write(
            &path,
            "URN,EstablishmentName,EstablishmentStatus (name),Easting,Northing\n1,The Holt School,Open,480000,170000\n",
        )
        .unwrap();

        let config = PipelineConfig {
            primary: DatasetSource::File(path),
            secondary: Some(DatasetSource::File("/definitely/not/here.csv".into())),
            out: None,
            export_csv: None,
            datum: DatumMode::Airy,
            open_marker: "Open".to_string(),
        };
        let out = run_build(&config).unwrap();
        assert_eq!(out.entities.len(), 1);
        assert!(matches!(out.metadata.degraded, Some(Degradation::SecondaryUnreadable { .. })));
    }
}
