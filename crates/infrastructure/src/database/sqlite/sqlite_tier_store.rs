use async_trait::async_trait;
use chrono::{DateTime, Utc};
use collector_core::{AssetTierAssignment, CollectorResult, TierStore, Timeframe};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, instrument};

use crate::database::{counter_from_column, tier_from_column};

pub struct SqliteTierStore {
    pool: SqlitePool,
}

impl SqliteTierStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_assignment(row: &SqliteRow) -> CollectorResult<AssetTierAssignment> {
        let asset_id: String = row.try_get("asset_id")?;
        let tier = tier_from_column(&asset_id, row.try_get("tier")?)?;

        Ok(AssetTierAssignment {
            tier,
            activity_score: row.try_get("activity_score")?,
            last_tier_change: row.try_get("last_tier_change")?,
            consecutive_high_scores: counter_from_column(row.try_get("consecutive_high_count")?),
            consecutive_low_scores: counter_from_column(row.try_get("consecutive_low_count")?),
            asset_id,
        })
    }
}

#[async_trait]
impl TierStore for SqliteTierStore {
    #[instrument(skip(self))]
    async fn get_tier_assignments(&self) -> CollectorResult<Vec<AssetTierAssignment>> {
        let rows = sqlx::query(
            "SELECT asset_id, tier, activity_score, last_tier_change, \
             consecutive_high_count, consecutive_low_count FROM asset_tiers",
        )
        .fetch_all(&self.pool)
        .await?;

        let assignments = rows
            .iter()
            .map(Self::row_to_assignment)
            .collect::<CollectorResult<Vec<_>>>()?;

        debug!("读取到 {} 条层级分配", assignments.len());
        Ok(assignments)
    }

    #[instrument(skip(self), fields(asset_id = %asset_id, timeframe = %timeframe))]
    async fn count_records_since(
        &self,
        asset_id: &str,
        timeframe: Timeframe,
        since: DateTime<Utc>,
    ) -> CollectorResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM ohlcv WHERE asset_id = ? AND timeframe = ? AND created_at >= ?",
        )
        .bind(asset_id)
        .bind(timeframe.as_str())
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
