//! Left outer join of the location registry with the outcome registry.
//!
//! The primary (location) dataset is always the left side: every primary row
//! comes out of the merge exactly once, in input order, whether or not the
//! outcome registry knows its identifier. Dropping rows is the normalizer's
//! job, never the merger's.
//!
//! When the join cannot be performed at all (no secondary dataset, or a join
//! column is unresolved) the merge degrades to "primary-only": every row gets
//! the explicit [`UNKNOWN_MARKER`] for its rating code and inspection date, and
//! the reason is reported back as a [`Degradation`] instead of an error.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::{debug, warn};

use crate::domain::{ColumnRole, Degradation};
use crate::io::ingest::{Dataset, RawRow};
use crate::schema::SchemaProjection;

/// Placeholder carried by secondary-sourced fields in primary-only mode.
pub const UNKNOWN_MARKER: &str = "Unknown";

/// A loaded secondary dataset together with its resolved schema.
#[derive(Debug, Clone, Copy)]
pub struct SecondaryView<'s> {
    pub dataset: &'s Dataset,
    pub schema: &'s SchemaProjection,
}

/// One primary row plus whatever the outcome registry contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedRow<'a> {
    pub primary: &'a RawRow,
    /// Normalized join key, if the primary row carries one.
    pub identifier: Option<String>,
    pub rating_code: Option<String>,
    pub inspection_date: Option<String>,
    /// A secondary row with the same identifier was found.
    pub matched: bool,
}

/// Joined rows plus join bookkeeping.
#[derive(Debug, Clone)]
pub struct MergeOutcome<'a> {
    pub rows: Vec<JoinedRow<'a>>,
    /// Set when the merge fell back to primary-only.
    pub degraded: Option<Degradation>,
    pub matched: usize,
    /// Secondary rows ignored because an earlier row had the same identifier.
    pub duplicate_keys: usize,
}

/// Canonical join key: trimmed, with one trailing `.0` float artifact removed.
///
/// The same URN is typed as a number in one export (`100001.0`) and as text
/// in the other (`100001`).
pub fn normalize_identifier(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_suffix(".0").unwrap_or(trimmed).to_string()
}

/// Left-join `primary` with `secondary` on the identifier role.
///
/// `secondary` is `Err` with the reason when no secondary dataset is
/// available; the merge then runs in primary-only mode. This never fails.
pub fn merge<'a>(
    primary: &'a Dataset,
    primary_schema: &SchemaProjection,
    secondary: Result<SecondaryView<'_>, Degradation>,
) -> MergeOutcome<'a> {
    let primary_id_col = primary_schema.require(ColumnRole::Identifier);

    let plan = match (primary_id_col, secondary) {
        (Err(missing), _) => Err(Degradation::from(missing)),
        (Ok(_), Err(reason)) => Err(reason),
        (Ok(_), Ok(view)) => join_columns(view).map(|cols| (view, cols)),
    };

    let (view, (sec_id_col, sec_rating_col)) = match plan {
        Ok(plan) => plan,
        Err(reason) => {
            warn!(reason = %reason, "merge degraded to primary-only");
            return primary_only(primary, primary_schema, reason);
        }
    };

    let (index, duplicate_keys) = index_secondary(view.dataset, sec_id_col);
    if duplicate_keys > 0 {
        debug!(duplicate_keys, "secondary dataset repeats identifiers; first occurrence kept");
    }
    let sec_date_col = view.schema.column(ColumnRole::InspectionDate);

    let mut matched = 0usize;
    let rows = primary
        .rows
        .iter()
        .map(|row| {
            let identifier = primary_identifier(row, primary_schema);
            let hit = identifier
                .as_deref()
                .and_then(|id| index.get(id))
                .map(|&idx| &view.dataset.rows[idx]);

            match hit {
                Some(sec_row) => {
                    matched += 1;
                    JoinedRow {
                        primary: row,
                        identifier,
                        rating_code: sec_row.get(sec_rating_col).map(str::to_string),
                        inspection_date: sec_date_col.and_then(|c| sec_row.get(c)).map(str::to_string),
                        matched: true,
                    }
                }
                None => JoinedRow {
                    primary: row,
                    identifier,
                    rating_code: None,
                    inspection_date: None,
                    matched: false,
                },
            }
        })
        .collect();

    MergeOutcome {
        rows,
        degraded: None,
        matched,
        duplicate_keys,
    }
}

fn join_columns(view: SecondaryView<'_>) -> Result<(usize, usize), Degradation> {
    let resolve = |role: ColumnRole| view.schema.require(role).map_err(Degradation::from);
    Ok((resolve(ColumnRole::Identifier)?, resolve(ColumnRole::RatingCode)?))
}

fn primary_identifier(row: &RawRow, schema: &SchemaProjection) -> Option<String> {
    schema
        .value(row, ColumnRole::Identifier)
        .map(normalize_identifier)
        .filter(|id| !id.is_empty())
}

fn index_secondary(dataset: &Dataset, id_col: usize) -> (HashMap<String, usize>, usize) {
    let mut index = HashMap::with_capacity(dataset.rows.len());
    let mut duplicates = 0usize;

    for (idx, row) in dataset.rows.iter().enumerate() {
        let Some(id) = row.get(id_col).map(normalize_identifier) else {
            continue;
        };
        if id.is_empty() {
            continue;
        }
        match index.entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(idx);
            }
            Entry::Occupied(_) => duplicates += 1,
        }
    }

    (index, duplicates)
}

fn primary_only<'a>(primary: &'a Dataset, schema: &SchemaProjection, reason: Degradation) -> MergeOutcome<'a> {
    let rows = primary
        .rows
        .iter()
        .map(|row| JoinedRow {
            primary: row,
            identifier: primary_identifier(row, schema),
            rating_code: Some(UNKNOWN_MARKER.to_string()),
            inspection_date: Some(UNKNOWN_MARKER.to_string()),
            matched: false,
        })
        .collect();

    MergeOutcome {
        rows,
        degraded: Some(reason),
        matched: 0,
        duplicate_keys: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DatasetKind;
    use crate::schema::CandidateTable;

    fn dataset(headers: &[&str], rows: &[&[&str]]) -> Dataset {
        Dataset::from_parts(
            "test",
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter().map(|r| r.iter().map(|c| c.to_string()).collect()).collect(),
        )
    }

    fn schema(kind: DatasetKind, ds: &Dataset) -> SchemaProjection {
        SchemaProjection::resolve(kind, ds, &CandidateTable::default())
    }

    #[test]
    fn identifier_normalization_strips_float_artifact_once() {
        assert_eq!(normalize_identifier(" 100001.0 "), "100001");
        assert_eq!(normalize_identifier("100001"), "100001");
        assert_eq!(normalize_identifier("100001.0.0"), "100001.0");
        assert_eq!(normalize_identifier("100001.05"), "100001.05");
    }

    #[test]
    fn left_join_keeps_unmatched_primary_rows_in_order() {
        let primary = dataset(&["URN", "EstablishmentName"], &[&["1.0", "A"], &["2", "B"], &["3", "C"]]);
        let secondary = dataset(&["URN", "Overall effectiveness", "Inspection end date"], &[&["3", "2", "01/02/2023"], &["1", "1", ""]]);
        let p_schema = schema(DatasetKind::Primary, &primary);
        let s_schema = schema(DatasetKind::Secondary, &secondary);

        let out = merge(
            &primary,
            &p_schema,
            Ok(SecondaryView {
                dataset: &secondary,
                schema: &s_schema,
            }),
        );

        assert!(out.degraded.is_none());
        assert_eq!(out.rows.len(), 3);
        assert_eq!(out.matched, 2);

        assert_eq!(out.rows[0].identifier.as_deref(), Some("1"));
        assert_eq!(out.rows[0].rating_code.as_deref(), Some("1"));
        assert_eq!(out.rows[0].inspection_date, None);

        assert!(!out.rows[1].matched);
        assert_eq!(out.rows[1].rating_code, None);

        assert_eq!(out.rows[2].rating_code.as_deref(), Some("2"));
        assert_eq!(out.rows[2].inspection_date.as_deref(), Some("01/02/2023"));
    }

    #[test]
    fn first_secondary_duplicate_wins() {
        let primary = dataset(&["URN"], &[&["7"]]);
        let secondary = dataset(&["URN", "Overall effectiveness"], &[&["7", "3"], &["7.0", "1"]]);
        let p_schema = schema(DatasetKind::Primary, &primary);
        let s_schema = schema(DatasetKind::Secondary, &secondary);

        let out = merge(
            &primary,
            &p_schema,
            Ok(SecondaryView {
                dataset: &secondary,
                schema: &s_schema,
            }),
        );
        assert_eq!(out.duplicate_keys, 1);
        assert_eq!(out.rows[0].rating_code.as_deref(), Some("3"));
    }

    #[test]
    fn absent_secondary_degrades_to_primary_only() {
        let primary = dataset(&["URN"], &[&["1"], &["2"]]);
        let p_schema = schema(DatasetKind::Primary, &primary);

        let out = merge(&primary, &p_schema, Err(Degradation::SecondaryMissing));

        assert_eq!(out.degraded, Some(Degradation::SecondaryMissing));
        assert_eq!(out.rows.len(), 2);
        for row in &out.rows {
            assert_eq!(row.rating_code.as_deref(), Some(UNKNOWN_MARKER));
            assert_eq!(row.inspection_date.as_deref(), Some(UNKNOWN_MARKER));
        }
    }

    #[test]
    fn unresolved_secondary_rating_column_degrades() {
        let primary = dataset(&["URN"], &[&["1"]]);
        let secondary = dataset(&["URN", "Something else"], &[&["1", "x"]]);
        let p_schema = schema(DatasetKind::Primary, &primary);
        let s_schema = schema(DatasetKind::Secondary, &secondary);

        let out = merge(
            &primary,
            &p_schema,
            Ok(SecondaryView {
                dataset: &secondary,
                schema: &s_schema,
            }),
        );
        assert_eq!(
            out.degraded,
            Some(Degradation::MissingColumn {
                dataset: DatasetKind::Secondary,
                role: ColumnRole::RatingCode,
            })
        );
        assert_eq!(out.rows[0].rating_code.as_deref(), Some(UNKNOWN_MARKER));
    }

    #[test]
    fn unresolved_primary_identifier_degrades() {
        let primary = dataset(&["EstablishmentName"], &[&["A"]]);
        let secondary = dataset(&["URN", "Overall effectiveness"], &[&["1", "1"]]);
        let p_schema = schema(DatasetKind::Primary, &primary);
        let s_schema = schema(DatasetKind::Secondary, &secondary);

        let out = merge(
            &primary,
            &p_schema,
            Ok(SecondaryView {
                dataset: &secondary,
                schema: &s_schema,
            }),
        );
        assert_eq!(
            out.degraded,
            Some(Degradation::MissingColumn {
                dataset: DatasetKind::Primary,
                role: ColumnRole::Identifier,
            })
        );
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].identifier, None);
    }
}
