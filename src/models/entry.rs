use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use thiserror::Error;

use crate::domain::EntryId;

/// Task complexity: Easy (1), Medium (2), Hard (3).
pub const COMPLEXITY_RANGE: RangeInclusive<i32> = 1..=3;

pub const SATISFACTION_RANGE: RangeInclusive<i32> = 1..=5;

/// Workflow impact: "Little to none" (1) through "Significant improvement" (5).
pub const WORKFLOW_IMPACT_RANGE: RangeInclusive<i32> = 1..=5;

/// Defaults written into rows that predate a column.
pub mod backfill {
    pub const DURATION_MINUTES: i32 = 0;
    pub const TIME_SAVED_MINUTES: i32 = 0;
    pub const COMPLEXITY_RATING: i32 = 1;
    pub const SATISFACTION_RATING: i32 = 3;
    pub const WORKFLOW_IMPACT_RATING: i32 = 1;
}

/// A field failed validation at write time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Allowed values for the categorical fields.
///
/// An empty list leaves that field freeform. With `enforce` off every list
/// is treated as a suggestion only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoiceLists {
    pub managers: Vec<String>,
    pub tools: Vec<String>,
    pub purposes: Vec<String>,
    pub enforce: bool,
}

impl Default for ChoiceLists {
    fn default() -> Self {
        Self {
            managers: vec!["Manager 1".to_string(), "Manager 2".to_string()],
            tools: vec!["ChatGPT".to_string(), "GitHub Copilot".to_string()],
            purposes: vec![
                "Development".to_string(),
                "Writing".to_string(),
                "Other".to_string(),
            ],
            enforce: true,
        }
    }
}

impl ChoiceLists {
    /// Choice lists that accept any non-blank value.
    #[must_use]
    pub const fn freeform() -> Self {
        Self {
            managers: Vec::new(),
            tools: Vec::new(),
            purposes: Vec::new(),
            enforce: false,
        }
    }

    fn check(&self, field: &'static str, value: &str, allowed: &[String]) -> Result<(), ValidationError> {
        if !self.enforce || allowed.is_empty() {
            return Ok(());
        }
        if allowed.iter().any(|choice| choice == value) {
            Ok(())
        } else {
            Err(ValidationError::new(
                field,
                format!("'{value}' is not one of: {}", allowed.join(", ")),
            ))
        }
    }
}

/// One logged AI-tool usage event as persisted by either backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEntry {
    pub id: EntryId,
    pub employee_name: String,
    pub manager: String,
    pub tool: String,
    pub purpose: String,
    pub duration_minutes: i32,
    pub time_saved_minutes: i32,
    pub complexity_rating: i32,
    pub satisfaction_rating: i32,
    pub workflow_impact_rating: i32,
    pub result_outcome: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The user-supplied part of an entry, as submitted by the survey form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUsageEntry {
    #[serde(default)]
    pub employee_name: String,
    pub manager: String,
    pub tool: String,
    pub purpose: String,
    pub duration_minutes: i32,
    #[serde(default)]
    pub time_saved_minutes: i32,
    pub complexity_rating: i32,
    pub satisfaction_rating: i32,
    pub workflow_impact_rating: i32,
    pub result_outcome: String,
    #[serde(default)]
    pub notes: String,
}

/// Partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageEntryPatch {
    pub employee_name: Option<String>,
    pub manager: Option<String>,
    pub tool: Option<String>,
    pub purpose: Option<String>,
    pub duration_minutes: Option<i32>,
    pub time_saved_minutes: Option<i32>,
    pub complexity_rating: Option<i32>,
    pub satisfaction_rating: Option<i32>,
    pub workflow_impact_rating: Option<i32>,
    pub result_outcome: Option<String>,
    pub notes: Option<String>,
}

impl NewUsageEntry {
    /// Trims text fields and validates the result.
    pub fn validated(self, choices: &ChoiceLists) -> Result<Self, ValidationError> {
        let entry = self.trimmed();
        entry.validate(choices)?;
        Ok(entry)
    }

    fn trimmed(self) -> Self {
        Self {
            employee_name: self.employee_name.trim().to_string(),
            manager: self.manager.trim().to_string(),
            tool: self.tool.trim().to_string(),
            purpose: self.purpose.trim().to_string(),
            result_outcome: self.result_outcome.trim().to_string(),
            notes: self.notes.trim().to_string(),
            ..self
        }
    }

    pub fn validate(&self, choices: &ChoiceLists) -> Result<(), ValidationError> {
        for (field, value) in [
            ("employee_name", &self.employee_name),
            ("manager", &self.manager),
            ("tool", &self.tool),
            ("purpose", &self.purpose),
            ("result_outcome", &self.result_outcome),
        ] {
            check_required(field, value)?;
        }

        choices.check("manager", &self.manager, &choices.managers)?;
        choices.check("tool", &self.tool, &choices.tools)?;
        choices.check("purpose", &self.purpose, &choices.purposes)?;

        check_duration(self.duration_minutes)?;
        check_time_saved(self.time_saved_minutes)?;

        check_rating("complexity_rating", self.complexity_rating, &COMPLEXITY_RANGE)?;
        check_rating("satisfaction_rating", self.satisfaction_rating, &SATISFACTION_RANGE)?;
        check_rating(
            "workflow_impact_rating",
            self.workflow_impact_rating,
            &WORKFLOW_IMPACT_RANGE,
        )?;

        Ok(())
    }
}

impl UsageEntryPatch {
    /// Trims the supplied text fields and validates them. Fields the patch
    /// leaves out are not checked, so rows carrying backfilled or retired
    /// values stay editable.
    pub fn validated(self, choices: &ChoiceLists) -> Result<Self, ValidationError> {
        let trim = |value: Option<String>| value.map(|v| v.trim().to_string());
        let patch = Self {
            employee_name: trim(self.employee_name),
            manager: trim(self.manager),
            tool: trim(self.tool),
            purpose: trim(self.purpose),
            result_outcome: trim(self.result_outcome),
            notes: trim(self.notes),
            ..self
        };
        patch.validate(choices)?;
        Ok(patch)
    }

    pub fn validate(&self, choices: &ChoiceLists) -> Result<(), ValidationError> {
        for (field, value) in [
            ("employee_name", &self.employee_name),
            ("manager", &self.manager),
            ("tool", &self.tool),
            ("purpose", &self.purpose),
            ("result_outcome", &self.result_outcome),
        ] {
            if let Some(value) = value {
                check_required(field, value)?;
            }
        }

        if let Some(manager) = &self.manager {
            choices.check("manager", manager, &choices.managers)?;
        }
        if let Some(tool) = &self.tool {
            choices.check("tool", tool, &choices.tools)?;
        }
        if let Some(purpose) = &self.purpose {
            choices.check("purpose", purpose, &choices.purposes)?;
        }

        if let Some(duration) = self.duration_minutes {
            check_duration(duration)?;
        }
        if let Some(saved) = self.time_saved_minutes {
            check_time_saved(saved)?;
        }

        for (field, value, range) in [
            ("complexity_rating", self.complexity_rating, &COMPLEXITY_RANGE),
            ("satisfaction_rating", self.satisfaction_rating, &SATISFACTION_RANGE),
            (
                "workflow_impact_rating",
                self.workflow_impact_rating,
                &WORKFLOW_IMPACT_RANGE,
            ),
        ] {
            if let Some(value) = value {
                check_rating(field, value, range)?;
            }
        }

        Ok(())
    }
}

fn check_required(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new(field, "is required"))
    } else {
        Ok(())
    }
}

fn check_duration(minutes: i32) -> Result<(), ValidationError> {
    if minutes > 0 {
        Ok(())
    } else {
        Err(ValidationError::new("duration_minutes", "must be greater than 0"))
    }
}

fn check_time_saved(minutes: i32) -> Result<(), ValidationError> {
    if minutes < 0 {
        Err(ValidationError::new("time_saved_minutes", "must not be negative"))
    } else {
        Ok(())
    }
}

fn check_rating(
    field: &'static str,
    value: i32,
    range: &RangeInclusive<i32>,
) -> Result<(), ValidationError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new(
            field,
            format!("must be between {} and {}", range.start(), range.end()),
        ))
    }
}

impl UsageEntry {
    /// Builds a stored entry from validated input; both timestamps are `now`.
    #[must_use]
    pub fn from_new(id: EntryId, fields: NewUsageEntry, now: DateTime<Utc>) -> Self {
        Self {
            id,
            employee_name: fields.employee_name,
            manager: fields.manager,
            tool: fields.tool,
            purpose: fields.purpose,
            duration_minutes: fields.duration_minutes,
            time_saved_minutes: fields.time_saved_minutes,
            complexity_rating: fields.complexity_rating,
            satisfaction_rating: fields.satisfaction_rating,
            workflow_impact_rating: fields.workflow_impact_rating,
            result_outcome: fields.result_outcome,
            notes: fields.notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// The user-supplied fields, without id and timestamps.
    #[must_use]
    pub fn fields(&self) -> NewUsageEntry {
        NewUsageEntry {
            employee_name: self.employee_name.clone(),
            manager: self.manager.clone(),
            tool: self.tool.clone(),
            purpose: self.purpose.clone(),
            duration_minutes: self.duration_minutes,
            time_saved_minutes: self.time_saved_minutes,
            complexity_rating: self.complexity_rating,
            satisfaction_rating: self.satisfaction_rating,
            workflow_impact_rating: self.workflow_impact_rating,
            result_outcome: self.result_outcome.clone(),
            notes: self.notes.clone(),
        }
    }

    /// Validates the fields `patch` supplies, merges them into this entry
    /// and bumps `updated_at`. On error `self` is left unchanged.
    pub fn apply(
        &mut self,
        patch: UsageEntryPatch,
        choices: &ChoiceLists,
        now: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        let patch = patch.validated(choices)?;

        if let Some(value) = patch.employee_name {
            self.employee_name = value;
        }
        if let Some(value) = patch.manager {
            self.manager = value;
        }
        if let Some(value) = patch.tool {
            self.tool = value;
        }
        if let Some(value) = patch.purpose {
            self.purpose = value;
        }
        if let Some(value) = patch.duration_minutes {
            self.duration_minutes = value;
        }
        if let Some(value) = patch.time_saved_minutes {
            self.time_saved_minutes = value;
        }
        if let Some(value) = patch.complexity_rating {
            self.complexity_rating = value;
        }
        if let Some(value) = patch.satisfaction_rating {
            self.satisfaction_rating = value;
        }
        if let Some(value) = patch.workflow_impact_rating {
            self.workflow_impact_rating = value;
        }
        if let Some(value) = patch.result_outcome {
            self.result_outcome = value;
        }
        if let Some(value) = patch.notes {
            self.notes = value;
        }

        self.updated_at = now.max(self.created_at);
        Ok(())
    }

    /// Whether this entry was submitted by `name` (case-insensitive).
    #[must_use]
    pub fn is_owned_by(&self, name: &str) -> bool {
        self.employee_name.trim().eq_ignore_ascii_case(name.trim())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample(tool: &str) -> NewUsageEntry {
        NewUsageEntry {
            employee_name: "Alice Wonderland".to_string(),
            manager: "Manager 1".to_string(),
            tool: tool.to_string(),
            purpose: "Development".to_string(),
            duration_minutes: 30,
            time_saved_minutes: 45,
            complexity_rating: 2,
            satisfaction_rating: 4,
            workflow_impact_rating: 3,
            result_outcome: "Completed successfully".to_string(),
            notes: "Scaffolded the service".to_string(),
        }
    }

    #[test]
    fn valid_entry_passes_and_is_trimmed() {
        let mut input = sample("ChatGPT");
        input.employee_name = "  Alice Wonderland ".to_string();
        let entry = input.validated(&ChoiceLists::default()).unwrap();
        assert_eq!(entry.employee_name, "Alice Wonderland");
    }

    #[test]
    fn blank_required_field_is_rejected() {
        let mut input = sample("ChatGPT");
        input.result_outcome = "   ".to_string();
        let err = input.validated(&ChoiceLists::default()).unwrap_err();
        assert_eq!(err.field, "result_outcome");
    }

    #[test]
    fn out_of_list_tool_is_rejected_when_enforced() {
        let err = sample("Claude")
            .validated(&ChoiceLists::default())
            .unwrap_err();
        assert_eq!(err.field, "tool");
        assert!(err.message.contains("ChatGPT"));
    }

    #[test]
    fn freeform_lists_accept_any_value() {
        assert!(sample("Claude").validated(&ChoiceLists::freeform()).is_ok());

        let choices = ChoiceLists {
            tools: Vec::new(),
            ..ChoiceLists::default()
        };
        assert!(sample("Claude").validated(&choices).is_ok());
    }

    #[test]
    fn numeric_bounds_are_checked() {
        let mut input = sample("ChatGPT");
        input.duration_minutes = 0;
        assert_eq!(
            input.validated(&ChoiceLists::default()).unwrap_err().field,
            "duration_minutes"
        );

        let mut input = sample("ChatGPT");
        input.complexity_rating = 4;
        assert_eq!(
            input.validated(&ChoiceLists::default()).unwrap_err().field,
            "complexity_rating"
        );

        let mut input = sample("ChatGPT");
        input.satisfaction_rating = 0;
        assert_eq!(
            input.validated(&ChoiceLists::default()).unwrap_err().field,
            "satisfaction_rating"
        );
    }

    #[test]
    fn apply_changes_only_patched_field() {
        let created = crate::domain::parse_timestamp("2025-01-01T00:00:00Z").unwrap();
        let later = crate::domain::parse_timestamp("2025-01-02T00:00:00Z").unwrap();
        let mut entry = UsageEntry::from_new(EntryId::new(1), sample("ChatGPT"), created);
        let before = entry.clone();

        let patch = UsageEntryPatch {
            satisfaction_rating: Some(5),
            ..UsageEntryPatch::default()
        };
        entry.apply(patch, &ChoiceLists::default(), later).unwrap();

        assert_eq!(entry.satisfaction_rating, 5);
        assert_eq!(entry.updated_at, later);
        assert_eq!(entry.created_at, before.created_at);
        assert_eq!(
            UsageEntry {
                satisfaction_rating: before.satisfaction_rating,
                updated_at: before.updated_at,
                ..entry
            },
            before
        );
    }

    #[test]
    fn invalid_patch_leaves_entry_untouched() {
        let now = crate::domain::now();
        let mut entry = UsageEntry::from_new(EntryId::new(1), sample("ChatGPT"), now);
        let before = entry.clone();

        let patch = UsageEntryPatch {
            duration_minutes: Some(-5),
            ..UsageEntryPatch::default()
        };
        assert!(entry.apply(patch, &ChoiceLists::default(), now).is_err());
        assert_eq!(entry, before);
    }

    #[test]
    fn apply_ignores_untouched_backfilled_fields() {
        let now = crate::domain::now();
        let mut legacy = sample("Retired Tool");
        legacy.result_outcome = String::new();
        legacy.duration_minutes = backfill::DURATION_MINUTES;
        let mut entry = UsageEntry::from_new(EntryId::new(1), legacy, now);

        let patch = UsageEntryPatch {
            satisfaction_rating: Some(5),
            notes: Some("  revisited ".to_string()),
            ..UsageEntryPatch::default()
        };
        entry.apply(patch, &ChoiceLists::default(), now).unwrap();

        assert_eq!(entry.satisfaction_rating, 5);
        assert_eq!(entry.notes, "revisited");
        assert_eq!(entry.tool, "Retired Tool");
        assert_eq!(entry.result_outcome, "");
    }

    #[test]
    fn patched_fields_are_still_checked() {
        let now = crate::domain::now();
        let mut entry = UsageEntry::from_new(EntryId::new(1), sample("ChatGPT"), now);

        for (patch, field) in [
            (
                UsageEntryPatch {
                    result_outcome: Some("  ".to_string()),
                    ..UsageEntryPatch::default()
                },
                "result_outcome",
            ),
            (
                UsageEntryPatch {
                    tool: Some("Claude".to_string()),
                    ..UsageEntryPatch::default()
                },
                "tool",
            ),
            (
                UsageEntryPatch {
                    workflow_impact_rating: Some(9),
                    ..UsageEntryPatch::default()
                },
                "workflow_impact_rating",
            ),
        ] {
            let err = entry.apply(patch, &ChoiceLists::default(), now).unwrap_err();
            assert_eq!(err.field, field);
        }
    }

    #[test]
    fn ownership_ignores_case_and_padding() {
        let entry = UsageEntry::from_new(EntryId::new(1), sample("ChatGPT"), crate::domain::now());
        assert!(entry.is_owned_by(" alice wonderland"));
        assert!(!entry.is_owned_by("Bob"));
    }
}
