use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Capability set attached to a user and carried in every session token.
///
/// Ordered: each role includes everything the roles below it may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Editor,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Editor => "editor",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub fn allows(&self, capability: Capability) -> bool {
        *self >= capability.minimum_role()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "viewer" => Ok(Self::Viewer),
            "editor" => Ok(Self::Editor),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Operations gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ReadEntries,
    ModifyEntries,
    /// Modify entries submitted by someone else.
    ModifyAnyEntry,
}

impl Capability {
    #[must_use]
    pub const fn minimum_role(&self) -> Role {
        match self {
            Self::ReadEntries => Role::Viewer,
            Self::ModifyEntries => Role::Editor,
            Self::ModifyAnyEntry => Role::Admin,
        }
    }
}

/// Argon2 PHC string. Never printed, serialized or handed out of the
/// services layer.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    #[must_use]
    pub const fn new(phc: String) -> Self {
        Self(phc)
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

/// An authentication principal as seen by callers outside the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub username: String,
    /// Name used on submitted entries; falls back to the username.
    pub display_name: String,
    pub role: Role,
}

/// A provisioned user together with its credential.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user: User,
    pub password_hash: PasswordHash,
}
