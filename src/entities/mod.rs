pub mod prelude;

pub mod usage_entries;
pub mod users;
