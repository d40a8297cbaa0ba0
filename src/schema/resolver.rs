//! Column resolution: logical roles -> physical headers.
//!
//! The two source registries rename and reorder their columns between
//! vintages (`OfstedRating (name)` vs `Overall effectiveness`, suffixes like
//! `(name)` / `(code)`, etc.). Rather than hard-coding header strings at every
//! access, each dataset is resolved **once** into a [`SchemaProjection`]
//! (`ColumnRole -> column index`) and rows are read through that projection.
//!
//! Resolution order for one role (first hit wins):
//! 1. exact, case-sensitive header equality, candidates in priority order
//! 2. case-insensitive substring (header contains candidate), candidates in
//!    priority order, headers in file order

use std::collections::BTreeMap;

use crate::domain::{ColumnRole, DatasetKind, Degradation};
use crate::io::ingest::{Dataset, RawRow};

/// A role that a caller needed but the dataset does not provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{dataset} dataset has no column for `{role}`")]
pub struct MissingColumn {
    pub dataset: DatasetKind,
    pub role: ColumnRole,
}

impl From<MissingColumn> for Degradation {
    fn from(value: MissingColumn) -> Self {
        Degradation::MissingColumn {
            dataset: value.dataset,
            role: value.role,
        }
    }
}

/// Resolve one role's candidate list against a header list.
///
/// Returns `None` when nothing matches; callers treat that as "optional field
/// unavailable".
pub fn resolve<'h, C, H>(candidates: &[C], headers: &'h [H]) -> Option<&'h str>
where
    C: AsRef<str>,
    H: AsRef<str>,
{
    resolve_index(candidates, headers).map(|idx| headers[idx].as_ref())
}

fn resolve_index<C, H>(candidates: &[C], headers: &[H]) -> Option<usize>
where
    C: AsRef<str>,
    H: AsRef<str>,
{
    for candidate in candidates {
        let candidate = candidate.as_ref();
        if let Some(idx) = headers.iter().position(|h| h.as_ref() == candidate) {
            return Some(idx);
        }
    }

    let lowered: Vec<String> = headers.iter().map(|h| h.as_ref().to_lowercase()).collect();
    for candidate in candidates {
        let needle = candidate.as_ref().to_lowercase();
        if needle.is_empty() {
            continue;
        }
        if let Some(idx) = lowered.iter().position(|h| h.contains(&needle)) {
            return Some(idx);
        }
    }

    None
}

/// Ordered header fragments to try for each role.
#[derive(Debug, Clone)]
pub struct CandidateTable {
    roles: BTreeMap<ColumnRole, Vec<String>>,
}

impl CandidateTable {
    pub fn empty() -> Self {
        Self { roles: BTreeMap::new() }
    }

    pub fn candidates(&self, role: ColumnRole) -> &[String] {
        self.roles.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the candidate list for `role`.
    pub fn with<I, S>(mut self, role: ColumnRole, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.insert(role, candidates.into_iter().map(Into::into).collect());
        self
    }
}

impl Default for CandidateTable {
    /// Headers used by the GIAS establishment export and the Ofsted
    /// management-information release.
    fn default() -> Self {
        Self::empty()
            .with(ColumnRole::Identifier, ["URN", "Unique reference number"])
            .with(
                ColumnRole::RatingCode,
                ["Overall effectiveness", "OfstedRating (name)", "OfstedRating", "Overall"],
            )
            .with(
                ColumnRole::InspectionDate,
                ["Inspection end date", "Publication date", "OfstedLastInsp", "Inspection date"],
            )
            .with(ColumnRole::Latitude, ["Latitude"])
            .with(ColumnRole::Longitude, ["Longitude"])
            .with(ColumnRole::Easting, ["Easting"])
            .with(ColumnRole::Northing, ["Northing"])
            .with(ColumnRole::Status, ["EstablishmentStatus (name)", "EstablishmentStatus", "Status"])
            .with(ColumnRole::Name, ["EstablishmentName", "School name", "SchoolName"])
            .with(ColumnRole::Phase, ["PhaseOfEducation (name)", "PhaseOfEducation", "Phase"])
            .with(
                ColumnRole::NurseryProvision,
                ["NurseryProvision (name)", "NurseryProvision", "Nursery"],
            )
    }
}

/// One dataset's resolved roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaProjection {
    dataset: DatasetKind,
    columns: [Option<usize>; ColumnRole::COUNT],
    headers: [Option<String>; ColumnRole::COUNT],
}

impl SchemaProjection {
    /// Resolve every role in `table` against `dataset`'s headers.
    pub fn resolve(kind: DatasetKind, dataset: &Dataset, table: &CandidateTable) -> Self {
        let mut columns = [None; ColumnRole::COUNT];
        let mut headers: [Option<String>; ColumnRole::COUNT] = Default::default();

        for role in ColumnRole::ALL {
            if let Some(idx) = resolve_index(table.candidates(role), &dataset.headers) {
                columns[role.index()] = Some(idx);
                headers[role.index()] = Some(dataset.headers[idx].clone());
            }
        }

        Self {
            dataset: kind,
            columns,
            headers,
        }
    }

    pub fn dataset(&self) -> DatasetKind {
        self.dataset
    }

    pub fn column(&self, role: ColumnRole) -> Option<usize> {
        self.columns[role.index()]
    }

    /// The physical header a role resolved to.
    pub fn header(&self, role: ColumnRole) -> Option<&str> {
        self.headers[role.index()].as_deref()
    }

    pub fn require(&self, role: ColumnRole) -> Result<usize, MissingColumn> {
        self.column(role).ok_or(MissingColumn {
            dataset: self.dataset,
            role,
        })
    }

    /// Trimmed, non-empty cell for `role` in `row`.
    pub fn value<'a>(&self, row: &'a RawRow, role: ColumnRole) -> Option<&'a str> {
        row.get(self.column(role)?)
    }

    /// Roles that resolved, with their headers.
    pub fn resolved(&self) -> impl Iterator<Item = (ColumnRole, &str)> + '_ {
        ColumnRole::ALL
            .into_iter()
            .filter_map(|role| self.header(role).map(|h| (role, h)))
    }
}
