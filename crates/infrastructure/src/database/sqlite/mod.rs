pub mod sqlite_tier_store;

pub use sqlite_tier_store::SqliteTierStore;
