pub mod app_config;
pub mod database;
pub mod observability;
pub mod orchestrator;
pub mod resilience;
pub mod upstream;

pub use app_config::AppConfig;
pub use database::DatabaseConfig;
pub use observability::ObservabilityConfig;
pub use orchestrator::OrchestratorConfig;
pub use resilience::{CircuitBreakerSettings, RetrySettings};
pub use upstream::{FeatureConfig, UpstreamConfig};
