use async_trait::async_trait;

use crate::models::Timeframe;
use crate::CollectorResult;

/// 上游数据采集接口
///
/// 一次调用负责获取并写入 `asset_id` 在 `timeframe` 周期上最近 `lookback_days`
/// 天的数据。返回 `Ok(false)` 表示上游明确报告本次采集未成功，调用方会把它
/// 当作可重试的失败处理。
///
/// # 错误分类
///
/// 实现应尽量返回已分类的错误，以便重试策略做出正确判断：
/// - 网络抖动、超时、限流 → `Network` / `Timeout` / `RateLimit`
/// - 资产不存在、数据格式不符 → `InvalidAsset` / `SchemaMismatch`（不会重试）
///
/// ```ignore
/// let ok = collector.collect("BTC", Timeframe::OneHour, 30).await?;
/// ```
#[async_trait]
pub trait DataCollector: Send + Sync {
    async fn collect(
        &self,
        asset_id: &str,
        timeframe: Timeframe,
        lookback_days: u32,
    ) -> CollectorResult<bool>;
}
