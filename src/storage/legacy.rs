//! Decoding of rows persisted under older layouts.
//!
//! The flat-file reader and the database import both go through
//! [`LegacyRow::decode`] and [`assign_missing_ids`], so the same legacy row
//! comes out identical on either backend.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::StorageError;
use crate::domain::{self, EntryId};
use crate::models::UsageEntry;
use crate::models::entry::{
    COMPLEXITY_RANGE, SATISFACTION_RANGE, WORKFLOW_IMPACT_RANGE, backfill,
};

/// Text cells of one row keyed by canonical column name.
///
/// Blank cells are treated as missing. Besides the current columns,
/// `time_without_ai` is recognized and converted into `time_saved_minutes`.
#[derive(Debug)]
pub struct LegacyRow {
    origin: String,
    cells: HashMap<&'static str, String>,
}

impl LegacyRow {
    /// `origin` names the row in error messages, e.g. `line 4`.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            cells: HashMap::new(),
        }
    }

    /// Records a cell. The first non-blank value for a column wins.
    pub fn set(&mut self, column: &'static str, value: &str) {
        let value = value.trim();
        if !value.is_empty() {
            self.cells
                .entry(column)
                .or_insert_with(|| value.to_string());
        }
    }

    fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    fn text(&self, column: &str) -> String {
        self.get(column).unwrap_or_default().to_string()
    }

    fn int(&self, column: &str) -> Result<Option<i32>, StorageError> {
        self.get(column)
            .map(|raw| {
                parse_int(raw).ok_or_else(|| {
                    StorageError::Io(format!(
                        "{}: column '{column}' has non-numeric value '{raw}'",
                        self.origin
                    ))
                })
            })
            .transpose()
    }

    fn rating(
        &self,
        column: &str,
        range: &std::ops::RangeInclusive<i32>,
        default: i32,
    ) -> Result<i32, StorageError> {
        Ok(self
            .int(column)?
            .map_or(default, |v| v.clamp(*range.start(), *range.end())))
    }

    fn timestamp(&self, column: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
        self.get(column)
            .map(|raw| {
                domain::parse_timestamp(raw).map_err(|e| {
                    StorageError::Io(format!("{}: column '{column}': {e}", self.origin))
                })
            })
            .transpose()
    }

    /// Decodes the row, filling missing columns with the backfill defaults.
    ///
    /// Returns the row's own id, if it has one, next to the entry. The
    /// entry's `id` is a placeholder until [`assign_missing_ids`] runs.
    pub fn decode(
        &self,
        migrated_at: DateTime<Utc>,
    ) -> Result<(Option<EntryId>, UsageEntry), StorageError> {
        let id = self.int("id")?.map(EntryId::new);

        let duration_minutes = self
            .int("duration_minutes")?
            .map_or(backfill::DURATION_MINUTES, |d| d.max(0));
        let time_saved_minutes = match self.int("time_saved_minutes")? {
            Some(saved) => saved.max(0),
            None => self
                .int("time_without_ai")?
                .map_or(backfill::TIME_SAVED_MINUTES, |without| {
                    without.saturating_sub(duration_minutes).max(0)
                }),
        };
        let created_at = self.timestamp("created_at")?.unwrap_or(migrated_at);
        let updated_at = self.timestamp("updated_at")?.unwrap_or(created_at);

        let entry = UsageEntry {
            id: id.unwrap_or_default(),
            employee_name: self.text("employee_name"),
            manager: self.text("manager"),
            tool: self.text("tool"),
            purpose: self.text("purpose"),
            duration_minutes,
            time_saved_minutes,
            complexity_rating: self.rating(
                "complexity_rating",
                &COMPLEXITY_RANGE,
                backfill::COMPLEXITY_RATING,
            )?,
            satisfaction_rating: self.rating(
                "satisfaction_rating",
                &SATISFACTION_RANGE,
                backfill::SATISFACTION_RATING,
            )?,
            workflow_impact_rating: self.rating(
                "workflow_impact_rating",
                &WORKFLOW_IMPACT_RANGE,
                backfill::WORKFLOW_IMPACT_RATING,
            )?,
            result_outcome: self.text("result_outcome"),
            notes: self.text("notes"),
            created_at,
            updated_at: updated_at.max(created_at),
        };

        Ok((id, entry))
    }
}

/// Gives every row without an id of its own the next id after the largest
/// one present, in row order.
pub fn assign_missing_ids(
    decoded: Vec<(Option<EntryId>, UsageEntry)>,
) -> Result<Vec<UsageEntry>, StorageError> {
    let mut next = decoded
        .iter()
        .filter_map(|(id, _)| *id)
        .max()
        .map_or(Some(EntryId::new(1)), |max| max.next());

    decoded
        .into_iter()
        .map(|(id, mut entry)| {
            if id.is_none() {
                let assigned = next.ok_or_else(id_space_exhausted)?;
                entry.id = assigned;
                next = assigned.next();
            }
            Ok(entry)
        })
        .collect()
}

pub(crate) fn id_space_exhausted() -> StorageError {
    StorageError::Io("no entry ids left to assign".to_string())
}

/// Accepts `3` as well as `3.0`, which spreadsheet exports produce.
pub(crate) fn parse_int(raw: &str) -> Option<i32> {
    if let Ok(value) = raw.parse::<i32>() {
        return Some(value);
    }
    let value = raw.parse::<f64>().ok()?;
    #[allow(clippy::cast_possible_truncation)]
    let truncated = value as i32;
    (value.fract() == 0.0 && f64::from(truncated) == value).then_some(truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&'static str, &str)]) -> LegacyRow {
        let mut row = LegacyRow::new("line 2");
        for &(column, value) in cells {
            row.set(column, value);
        }
        row
    }

    #[test]
    fn parse_int_accepts_float_exports() {
        assert_eq!(parse_int("3"), Some(3));
        assert_eq!(parse_int("3.0"), Some(3));
        assert_eq!(parse_int("3.5"), None);
        assert_eq!(parse_int("three"), None);
    }

    #[test]
    fn missing_columns_get_backfill_defaults() {
        let migrated_at = domain::parse_timestamp("2025-06-01T00:00:00Z").unwrap();
        let (id, entry) = row(&[("employee_name", " Alice "), ("tool", "ChatGPT")])
            .decode(migrated_at)
            .unwrap();

        assert_eq!(id, None);
        assert_eq!(entry.employee_name, "Alice");
        assert_eq!(entry.duration_minutes, backfill::DURATION_MINUTES);
        assert_eq!(entry.time_saved_minutes, backfill::TIME_SAVED_MINUTES);
        assert_eq!(entry.complexity_rating, backfill::COMPLEXITY_RATING);
        assert_eq!(entry.satisfaction_rating, backfill::SATISFACTION_RATING);
        assert_eq!(entry.workflow_impact_rating, backfill::WORKFLOW_IMPACT_RATING);
        assert_eq!(entry.result_outcome, "");
        assert_eq!(entry.created_at, migrated_at);
        assert_eq!(entry.updated_at, migrated_at);
    }

    #[test]
    fn legacy_values_are_normalized() {
        let (_, entry) = row(&[
            ("duration_minutes", "30"),
            ("time_without_ai", "90.0"),
            ("complexity_rating", "7"),
            ("created_at", "2025-03-04 10:15:30.123456"),
        ])
        .decode(domain::now())
        .unwrap();

        assert_eq!(entry.time_saved_minutes, 60);
        assert_eq!(entry.complexity_rating, *COMPLEXITY_RANGE.end());
        assert_eq!(
            domain::format_timestamp(&entry.created_at),
            "2025-03-04T10:15:30.123456Z"
        );
    }

    #[test]
    fn bad_number_names_the_row() {
        let err = row(&[("satisfaction_rating", "great")])
            .decode(domain::now())
            .unwrap_err();
        assert!(matches!(err, StorageError::Io(ref m) if m.contains("line 2") && m.contains("satisfaction_rating")));
    }

    #[test]
    fn blank_ids_never_collide_with_later_explicit_ids() {
        let now = domain::now();
        let decoded = [row(&[("id", "")]), row(&[("id", "2")]), row(&[])]
            .iter()
            .map(|r| r.decode(now).unwrap())
            .collect();

        let ids: Vec<i32> = assign_missing_ids(decoded)
            .unwrap()
            .iter()
            .map(|entry| entry.id.value())
            .collect();
        assert_eq!(ids, vec![3, 2, 4]);
    }

    #[test]
    fn exhausted_id_space_is_an_error() {
        let now = domain::now();
        let max = i32::MAX.to_string();
        let decoded = [row(&[("id", max.as_str())]), row(&[])]
            .iter()
            .map(|r| r.decode(now).unwrap())
            .collect();

        assert!(matches!(
            assign_missing_ids(decoded),
            Err(StorageError::Io(_))
        ));
    }
}
