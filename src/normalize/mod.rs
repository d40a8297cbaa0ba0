//! Per-row normalization of joined records into [`EnrichedEntity`] values.
//!
//! Steps, in order (the first failing step decides the skip reason):
//!
//! 1. status contains the open marker
//! 2. identifier present (only checked when the primary has an identifier column)
//! 3. coordinates: direct latitude/longitude, else easting/northing through the
//!    grid transformer, rounded to 6 decimal places and still not `(0, 0)`
//! 4. rating code -> [`Rating`]
//! 5. name cleanup, type, nursery flag, inspection date
//!
//! A skipped row never aborts the run; it only bumps a reason-tagged counter.

use chrono::NaiveDate;

use crate::domain::{ColumnRole, DatumMode, EnrichedEntity, GeoCoordinate, Rating, SkipCounts, SkipReason};
use crate::geo::transform_with_datum;
use crate::io::ingest::RawRow;
use crate::merge::{JoinedRow, UNKNOWN_MARKER};
use crate::schema::SchemaProjection;

/// Status token used by the GIAS registry for active establishments.
pub const DEFAULT_OPEN_MARKER: &str = "Open";

/// Case-insensitive markers in the nursery provision text.
const NURSERY_MARKERS: [&str; 2] = ["has nursery", "nursery school"];

/// Emitted for a missing or unknown inspection date.
pub const NO_DATE: &str = "N/A";

const COORDINATE_PLACES: i32 = 6;

/// Knobs that affect how rows are normalized.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Case-sensitive substring the status field must contain.
    pub open_marker: String,
    pub datum: DatumMode,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            open_marker: DEFAULT_OPEN_MARKER.to_string(),
            datum: DatumMode::Airy,
        }
    }
}

/// Normalizer bound to the primary dataset's resolved schema.
#[derive(Debug, Clone)]
pub struct RecordNormalizer<'s> {
    schema: &'s SchemaProjection,
    options: NormalizeOptions,
}

impl<'s> RecordNormalizer<'s> {
    pub fn new(schema: &'s SchemaProjection, options: NormalizeOptions) -> Self {
        Self { schema, options }
    }

    /// Normalize one joined row, or report why it was dropped.
    pub fn normalize(&self, row: &JoinedRow<'_>) -> Result<EnrichedEntity, SkipReason> {
        let primary = row.primary;

        if !self.is_active(primary) {
            return Err(SkipReason::Inactive);
        }

        if self.schema.column(ColumnRole::Identifier).is_some() && row.identifier.is_none() {
            return Err(SkipReason::MalformedIdentifier);
        }

        // A fix within 5e-7 degrees of (0, 0) rounds onto the sentinel.
        let coord = self
            .resolve_coordinates(primary)
            .map(|c| c.rounded(COORDINATE_PLACES))
            .filter(GeoCoordinate::is_fix)
            .ok_or(SkipReason::NoCoordinates)?;

        let raw_name = self.schema.value(primary, ColumnRole::Name).unwrap_or(UNKNOWN_MARKER);
        let name = clean_name(raw_name);
        let kind = establishment_type(self.schema.value(primary, ColumnRole::Phase), raw_name);

        Ok(EnrichedEntity {
            name,
            rating: map_rating(row.rating_code.as_deref()),
            kind,
            date: format_inspection_date(row.inspection_date.as_deref()),
            nursery: has_nursery(self.schema.value(primary, ColumnRole::NurseryProvision)),
            lat: coord.latitude,
            lon: coord.longitude,
        })
    }

    /// Normalize every row, keeping input order and counting skips.
    pub fn normalize_all<'r, 'd: 'r, I>(&self, rows: I) -> (Vec<EnrichedEntity>, SkipCounts)
    where
        I: IntoIterator<Item = &'r JoinedRow<'d>>,
    {
        let mut entities = Vec::new();
        let mut skips = SkipCounts::default();

        for row in rows {
            match self.normalize(row) {
                Ok(entity) => entities.push(entity),
                Err(reason) => skips.record(reason),
            }
        }

        (entities, skips)
    }

    fn is_active(&self, row: &RawRow) -> bool {
        self.schema
            .value(row, ColumnRole::Status)
            .is_some_and(|status| status.contains(self.options.open_marker.as_str()))
    }

    fn resolve_coordinates(&self, row: &RawRow) -> Option<GeoCoordinate> {
        let direct = parse_f64(self.schema.value(row, ColumnRole::Latitude))
            .zip(parse_f64(self.schema.value(row, ColumnRole::Longitude)))
            .map(|(lat, lon)| GeoCoordinate::new(lat, lon))
            .filter(GeoCoordinate::is_fix);
        if direct.is_some() {
            return direct;
        }

        let easting = parse_f64(self.schema.value(row, ColumnRole::Easting))?;
        let northing = parse_f64(self.schema.value(row, ColumnRole::Northing))?;
        Some(transform_with_datum(easting, northing, self.options.datum)).filter(GeoCoordinate::is_fix)
    }
}

/// Map a raw rating code onto [`Rating`]. Total: anything unrecognized is `Unknown`.
pub fn map_rating(raw: Option<&str>) -> Rating {
    let Some(raw) = raw else {
        return Rating::Unknown;
    };
    let raw = raw.trim();
    let code = raw.strip_suffix(".0").unwrap_or(raw);

    match code {
        "1" => Rating::Outstanding,
        "2" => Rating::Good,
        "3" => Rating::RequiresImprovement,
        "4" => Rating::Inadequate,
        _ if code.contains("Outstanding") => Rating::Outstanding,
        _ if code.contains("Good") => Rating::Good,
        _ if code.contains("Requires") => Rating::RequiresImprovement,
        _ if code.contains("Inadequate") => Rating::Inadequate,
        _ => Rating::Unknown,
    }
}

/// Strip one leading `"The "` and one trailing `" Academy"`.
pub fn clean_name(name: &str) -> String {
    let name = name.trim();
    let name = name.strip_prefix("The ").unwrap_or(name);
    let name = name.strip_suffix(" Academy").unwrap_or(name);
    name.to_string()
}

pub fn has_nursery(provision: Option<&str>) -> bool {
    let Some(provision) = provision else {
        return false;
    };
    let lower = provision.to_lowercase();
    NURSERY_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Phase of education, or a guess from the name when the registry has none.
pub fn establishment_type(phase: Option<&str>, name: &str) -> String {
    match phase {
        Some(phase) if !phase.eq_ignore_ascii_case("not applicable") => phase.to_string(),
        _ => infer_type_from_name(name).to_string(),
    }
}

fn infer_type_from_name(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    if ["primary", "infant", "junior"].iter().any(|w| lower.contains(w)) {
        "Primary"
    } else if ["secondary", "college", "high"].iter().any(|w| lower.contains(w)) {
        "Secondary"
    } else {
        "School"
    }
}

/// Inspection date as `DD-MM-YYYY`; unparseable text passes through trimmed.
pub fn format_inspection_date(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty() && *s != UNKNOWN_MARKER) else {
        return NO_DATE.to_string();
    };
    match parse_date(raw) {
        Some(date) => date.format("%d-%m-%Y").to_string(),
        None => raw.to_string(),
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    // Registry exports disagree on date layout between vintages; accept the
    // common ones and keep parsing deterministic.
    const FMTS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];
    FMTS.iter().find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

fn parse_f64(s: Option<&str>) -> Option<f64> {
    let v = s?.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
