use async_trait::async_trait;

use crate::models::{TierId, Timeframe};
use crate::CollectorResult;

/// 下游特征计算触发接口
#[async_trait]
pub trait FeaturePipeline: Send + Sync {
    /// 通知下游：`asset_ids` 在该层级、该周期上有新数据
    async fn trigger(
        &self,
        tier: TierId,
        timeframe: Timeframe,
        asset_ids: &[String],
    ) -> CollectorResult<()>;
}
