//! 分层采集调度
//!
//! - [`TierManager`]：静态层级配置 → 按优先级排序的采集调度
//! - [`CollectionExecutor`]：调度 → 子批次并发的采集任务，带重试与熔断
//! - [`CollectionOrchestrator`]：周期性刷新调度并在全局并发额度内派发到期调度

pub mod executor;
pub mod orchestrator;
pub mod tier_manager;

pub use executor::{CollectionExecutor, ExecutorConfig};
pub use orchestrator::{CollectionOrchestrator, OrchestratorTiming, TickReport};
pub use tier_manager::TierManager;
