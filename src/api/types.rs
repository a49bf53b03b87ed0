use serde::{Deserialize, Serialize};

use crate::models::{Role, UsageEntry};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EntryListDto {
    pub total: usize,
    pub entries: Vec<UsageEntry>,
}

impl From<Vec<UsageEntry>> for EntryListDto {
    fn from(entries: Vec<UsageEntry>) -> Self {
        Self {
            total: entries.len(),
            entries,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CountDto {
    pub count: u64,
    pub backend: String,
}

#[derive(Debug, Deserialize)]
pub struct EntryFilter {
    /// Exact, case-insensitive match on the tool column.
    pub tool: Option<String>,
    pub manager: Option<String>,
    pub purpose: Option<String>,
}

impl EntryFilter {
    #[must_use]
    pub fn matches(&self, entry: &UsageEntry) -> bool {
        let eq = |wanted: &Option<String>, actual: &str| {
            wanted
                .as_deref()
                .is_none_or(|w| w.trim().eq_ignore_ascii_case(actual.trim()))
        };
        eq(&self.tool, &entry.tool)
            && eq(&self.manager, &entry.manager)
            && eq(&self.purpose, &entry.purpose)
    }
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_recent_days")]
    pub days: u32,
}

const fn default_recent_days() -> u32 {
    7
}

#[derive(Debug, Serialize)]
pub struct IdentityDto {
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub expires_at: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
