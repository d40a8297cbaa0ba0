//! Terminal output: run summaries and single-point conversions.
//!
//! Formatting lives here so the pipeline stays free of presentation code and
//! output changes are localized.

use crate::domain::{DatumMode, GeoCoordinate, Rating, RunOutput};

/// Format the end-of-run summary (counts, skips, degradation, rating mix).
pub fn format_run_summary(output: &RunOutput) -> String {
    let meta = &output.metadata;
    let mut out = String::new();

    out.push_str("=== atlas - school registry build ===\n");
    out.push_str(&format!("Generated: {}\n", meta.generated_at.to_rfc3339()));
    out.push_str(&format!("Datum: {}\n", datum_label(meta.datum)));
    out.push_str(&format!(
        "Rows: read={} | emitted={} | skipped={}\n",
        meta.rows_read,
        meta.total_count,
        meta.skip_counts.total()
    ));

    if !meta.skip_counts.is_empty() {
        out.push_str("\nSkipped:\n");
        for (reason, count) in meta.skip_counts.iter() {
            out.push_str(&format!("- {reason}: {count}\n"));
        }
    }

    if let Some(reason) = &meta.degraded {
        out.push_str(&format!("\nDegraded: primary-only ({reason}); all ratings Unknown\n"));
    }

    out.push_str("\nRatings:\n");
    for rating in [
        Rating::Outstanding,
        Rating::Good,
        Rating::RequiresImprovement,
        Rating::Inadequate,
        Rating::Unknown,
    ] {
        let n = output.entities.iter().filter(|e| e.rating == rating).count();
        out.push_str(&format!("- {:<22}{n}\n", rating.label()));
    }

    let nursery = output.entities.iter().filter(|e| e.nursery).count();
    out.push_str(&format!("\nWith nursery provision: {nursery}\n"));

    out
}

/// Format one grid -> lat/lon conversion.
pub fn format_conversion(easting: f64, northing: f64, datum: DatumMode, coord: GeoCoordinate) -> String {
    if coord.is_sentinel() {
        return format!("E={easting} N={northing}: no fix (invalid or out-of-domain grid coordinate)");
    }
    format!(
        "E={easting} N={northing} -> lat={:.6} lon={:.6} ({})",
        coord.latitude,
        coord.longitude,
        datum_label(datum)
    )
}

fn datum_label(datum: DatumMode) -> &'static str {
    match datum {
        DatumMode::Airy => "Airy 1830 (no datum shift)",
        DatumMode::Wgs84 => "WGS84 (Helmert shift)",
    }
}
