//! 外部协作者接口定义
//!
//! 调度核心只依赖以下三个抽象：
//! - [`DataCollector`] - 拉取并持久化单个资产、单个周期的行情数据
//! - [`TierStore`] - 读取层级分配快照，统计已采集的记录数
//! - [`FeaturePipeline`] - 批次完成后通知下游特征计算
//!
//! 所有接口都是异步的，并要求 `Send + Sync`，以便在并发任务之间共享。

pub mod collector;
pub mod feature_pipeline;
pub mod tier_store;

pub use collector::*;
pub use feature_pipeline::*;
pub use tier_store::*;
