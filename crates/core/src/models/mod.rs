//! # 数据模型
//!
//! 分层采集调度的核心数据结构。
//!
//! - [`TierConfig`] / [`Timeframe`]：静态层级配置，启动时加载一次
//! - [`AssetTierAssignment`]：外部分类流程产出的资产层级分配，本系统只读
//! - [`CollectionSchedule`]：(层级, 周期) 维度的待执行单元
//! - [`CollectionJob`]：单个资产的一次采集
//! - [`CollectionBatch`]：一次调度执行产生的所有任务及汇总结果
//!
//! 所有时间字段使用 `DateTime<Utc>`，状态字段使用枚举并限制合法转换。

pub mod batch;
pub mod job;
pub mod schedule;
pub mod tier;

pub use batch::{BatchStatus, BatchSummary, CollectionBatch};
pub use job::{CollectionJob, JobStatus};
pub use schedule::{CollectionSchedule, ScheduleKey};
pub use tier::{AssetTierAssignment, TierConfig, TierId, TierStatistics, Timeframe};
