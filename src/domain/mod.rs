//! Domain primitives shared by both storage backends and the API layer.
//!
//! Timestamps go through a single formatting path, so the flat file and the
//! database persist identical text.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a usage entry.
///
/// Assigned by the backend at creation time and never reused for a
/// different entry while the original still exists.
///
/// # Examples
///
/// ```rust
/// use usagelog::domain::EntryId;
///
/// let id = EntryId::new(42);
/// assert_eq!(id.value(), 42);
/// assert_eq!(id.to_string(), "42");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EntryId(i32);

impl EntryId {
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> i32 {
        self.0
    }

    /// The id following this one, used by the flat-file `max + 1` allocator.
    /// `None` once the id space is exhausted.
    #[must_use]
    pub const fn next(&self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<EntryId> for i32 {
    fn from(id: EntryId) -> Self {
        id.0
    }
}

impl From<i32> for EntryId {
    fn from(id: i32) -> Self {
        Self::new(id)
    }
}

impl Serialize for EntryId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i32(self.0)
    }
}

impl<'de> Deserialize<'de> for EntryId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let id = i32::deserialize(deserializer)?;
        Ok(Self::new(id))
    }
}

/// Current UTC time at microsecond precision.
///
/// Both backends persist timestamps as text; truncating here means a value
/// read back compares equal to the value that was written.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Canonical on-disk representation of a timestamp.
///
/// Fixed-width RFC 3339 so lexical order matches chronological order, which
/// the `created_at` index relies on.
#[must_use]
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a persisted timestamp. Accepts any RFC 3339 offset as well as the
/// naive `YYYY-MM-DD[T ]HH:MM:SS[.f]` forms older files and tables hold.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let raw = raw.trim();
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Ok(ts.with_timezone(&Utc).trunc_subsecs(6)),
        Err(rfc_err) => ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|format| chrono::NaiveDateTime::parse_from_str(raw, format).ok())
            .map(|naive| naive.and_utc().trunc_subsecs(6))
            .ok_or(rfc_err),
    }
}
