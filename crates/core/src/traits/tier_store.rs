use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{AssetTierAssignment, Timeframe};
use crate::CollectorResult;

/// 层级分配与采集结果的只读存储接口
///
/// 层级分配由外部分类流程写入，调度核心在每次生成调度时读取一次快照。
#[async_trait]
pub trait TierStore: Send + Sync {
    /// 获取全部资产的当前层级分配
    async fn get_tier_assignments(&self) -> CollectorResult<Vec<AssetTierAssignment>>;

    /// 统计 `since` 之后写入的记录数，用于估算一次采集的产出
    async fn count_records_since(
        &self,
        asset_id: &str,
        timeframe: Timeframe,
        since: DateTime<Utc>,
    ) -> CollectorResult<i64>;
}
