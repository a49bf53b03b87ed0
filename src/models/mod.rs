pub mod entry;
pub mod user;

pub use entry::{ChoiceLists, NewUsageEntry, UsageEntry, UsageEntryPatch, ValidationError};
pub use user::{Capability, PasswordHash, Role, User, UserRecord};
