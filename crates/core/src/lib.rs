pub mod circuit_breaker;
pub mod config;
pub mod errors;
pub mod models;
pub mod retry;
pub mod traits;

pub use circuit_breaker::*;
pub use config::*;
pub use errors::*;
pub use models::{
    AssetTierAssignment, BatchStatus, BatchSummary, CollectionBatch, CollectionJob,
    CollectionSchedule, JobStatus, ScheduleKey, TierConfig, TierId, TierStatistics, Timeframe,
};
pub use retry::*;
pub use traits::{DataCollector, FeaturePipeline, TierStore};
