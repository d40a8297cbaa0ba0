//! Shared domain types.
//!
//! Everything the pipeline passes between stages lives here so that the
//! transformer, resolver, merger and normalizer agree on one vocabulary:
//!
//! - coordinates (`GridCoordinate`, `GeoCoordinate`)
//! - logical column roles (`ColumnRole`) and dataset identity (`DatasetKind`)
//! - normalized output (`EnrichedEntity`, `Rating`) and run bookkeeping
//!   (`SkipReason`, `SkipCounts`, `Degradation`, `RunMetadata`, `RunOutput`)

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// A National Grid position in meters (Airy 1830 Transverse Mercator).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCoordinate {
    pub easting: f64,
    pub northing: f64,
}

impl GridCoordinate {
    pub fn new(easting: f64, northing: f64) -> Self {
        Self { easting, northing }
    }

    /// Both components finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.easting.is_finite() && self.northing.is_finite() && self.easting > 0.0 && self.northing > 0.0
    }
}

/// Latitude/longitude in decimal degrees.
///
/// `(0, 0)` is reserved as the "no fix" sentinel and is never a legitimate
/// output of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinate {
    pub const SENTINEL: GeoCoordinate = GeoCoordinate {
        latitude: 0.0,
        longitude: 0.0,
    };

    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_sentinel(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }

    /// A usable fix: finite on both axes and not the sentinel.
    pub fn is_fix(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite() && !self.is_sentinel()
    }

    /// Round both axes to `places` decimal digits.
    pub fn rounded(&self, places: i32) -> Self {
        let scale = 10f64.powi(places);
        Self {
            latitude: (self.latitude * scale).round() / scale,
            longitude: (self.longitude * scale).round() / scale,
        }
    }
}

/// Logical field roles resolved against a dataset's headers at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnRole {
    Identifier,
    RatingCode,
    InspectionDate,
    Latitude,
    Longitude,
    Easting,
    Northing,
    Status,
    Name,
    Phase,
    NurseryProvision,
}

impl ColumnRole {
    pub const COUNT: usize = 11;

    pub const ALL: [ColumnRole; Self::COUNT] = [
        ColumnRole::Identifier,
        ColumnRole::RatingCode,
        ColumnRole::InspectionDate,
        ColumnRole::Latitude,
        ColumnRole::Longitude,
        ColumnRole::Easting,
        ColumnRole::Northing,
        ColumnRole::Status,
        ColumnRole::Name,
        ColumnRole::Phase,
        ColumnRole::NurseryProvision,
    ];

    /// Stable slot used by fixed-size projections.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            ColumnRole::Identifier => "identifier",
            ColumnRole::RatingCode => "rating code",
            ColumnRole::InspectionDate => "inspection date",
            ColumnRole::Latitude => "latitude",
            ColumnRole::Longitude => "longitude",
            ColumnRole::Easting => "easting",
            ColumnRole::Northing => "northing",
            ColumnRole::Status => "status",
            ColumnRole::Name => "name",
            ColumnRole::Phase => "phase",
            ColumnRole::NurseryProvision => "nursery provision",
        }
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which of the two input datasets a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    /// Location/identity registry (required).
    Primary,
    /// Inspection outcome registry (optional).
    Secondary,
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetKind::Primary => f.write_str("primary"),
            DatasetKind::Secondary => f.write_str("secondary"),
        }
    }
}

/// Inspection outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    Outstanding,
    Good,
    #[serde(rename = "Requires Improvement")]
    RequiresImprovement,
    Inadequate,
    Unknown,
}

impl Rating {
    pub fn label(self) -> &'static str {
        match self {
            Rating::Outstanding => "Outstanding",
            Rating::Good => "Good",
            Rating::RequiresImprovement => "Requires Improvement",
            Rating::Inadequate => "Inadequate",
            Rating::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One normalized, emitted school.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEntity {
    pub name: String,
    pub rating: Rating,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
    pub nursery: bool,
    pub lat: f64,
    pub lon: f64,
}

/// Why a joined row was dropped by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    Inactive,
    NoCoordinates,
    MalformedIdentifier,
}

impl SkipReason {
    pub fn label(self) -> &'static str {
        match self {
            SkipReason::Inactive => "inactive",
            SkipReason::NoCoordinates => "no-coordinates",
            SkipReason::MalformedIdentifier => "malformed-identifier",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-run skip counters keyed by reason. Only reasons that occurred appear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkipCounts(BTreeMap<SkipReason, usize>);

impl SkipCounts {
    pub fn record(&mut self, reason: SkipReason) {
        *self.0.entry(reason).or_insert(0) += 1;
    }

    pub fn get(&self, reason: SkipReason) -> usize {
        self.0.get(&reason).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SkipReason, usize)> + '_ {
        self.0.iter().map(|(reason, count)| (*reason, *count))
    }
}

/// How grid coordinates are turned into latitude/longitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatumMode {
    /// Ellipsoid-only inverse projection on Airy 1830 (no datum shift).
    #[default]
    Airy,
    /// Airy inverse projection followed by the OSGB36 -> WGS84 Helmert shift.
    ///
    /// Diverges from ellipsoid-only reference outputs by roughly 100 m.
    Wgs84,
}

/// Why a run fell back to primary-only output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum Degradation {
    /// No secondary source was configured.
    SecondaryMissing,
    /// The secondary source could not be fetched or parsed.
    SecondaryUnreadable { message: String },
    /// A column needed for the join could not be resolved.
    MissingColumn { dataset: DatasetKind, role: ColumnRole },
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degradation::SecondaryMissing => f.write_str("no secondary dataset configured"),
            Degradation::SecondaryUnreadable { message } => write!(f, "secondary dataset unreadable: {message}"),
            Degradation::MissingColumn { dataset, role } => {
                write!(f, "{dataset} dataset has no `{role}` column")
            }
        }
    }
}

/// Run-level metadata emitted alongside the entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub generated_at: DateTime<Utc>,
    pub total_count: usize,
    pub rows_read: usize,
    pub skip_counts: SkipCounts,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub degraded: Option<Degradation>,
    pub datum: DatumMode,
}

/// The single value a run emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub metadata: RunMetadata,
    pub entities: Vec<EnrichedEntity>,
}

/// Where a dataset is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    File(PathBuf),
    Url(String),
}

impl DatasetSource {
    /// `http://` / `https://` prefixes select a URL, anything else is a path.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            DatasetSource::Url(raw.to_string())
        } else {
            DatasetSource::File(PathBuf::from(raw))
        }
    }
}

impl fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetSource::File(path) => write!(f, "{}", path.display()),
            DatasetSource::Url(url) => f.write_str(url),
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// Derived from CLI flags, `.env` / environment fallbacks and defaults.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub primary: DatasetSource,
    pub secondary: Option<DatasetSource>,
    /// JSON output path; `None` prints the summary only.
    pub out: Option<PathBuf>,
    /// Optional flat CSV export of the entities.
    pub export_csv: Option<PathBuf>,
    pub datum: DatumMode,
    /// Case-sensitive token the status field must contain for a row to be active.
    pub open_marker: String,
}
