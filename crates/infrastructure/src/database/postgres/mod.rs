pub mod postgres_tier_store;

pub use postgres_tier_store::PostgresTierStore;
