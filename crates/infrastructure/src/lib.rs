pub mod database;
pub mod observability;
pub mod upstream;

pub use database::{DatabaseManager, DatabasePool, DatabaseType, PostgresTierStore, SqliteTierStore};
pub use observability::{install_prometheus_exporter, MetricsCollector};
pub use upstream::{HttpDataCollector, HttpFeaturePipeline};
