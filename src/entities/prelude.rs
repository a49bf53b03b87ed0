pub use super::usage_entries::Entity as UsageEntries;
pub use super::users::Entity as Users;
