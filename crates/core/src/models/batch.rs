use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::CollectionJob;
use super::tier::{TierId, Timeframe};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BatchStatus {
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
}

/// 一次调度执行的全部任务及其汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionBatch {
    pub id: Uuid,
    pub tier: TierId,
    pub timeframe: Timeframe,
    pub asset_ids: Vec<String>,
    pub jobs: Vec<CollectionJob>,
    pub status: BatchStatus,
    pub total_records: i64,
    pub success_count: usize,
    pub failure_count: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// 面向运维的批次摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub tier: TierId,
    pub timeframe: Timeframe,
    pub status: BatchStatus,
    pub job_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub total_records: i64,
    pub elapsed_ms: u64,
}

impl CollectionBatch {
    pub fn new(
        tier: TierId,
        timeframe: Timeframe,
        asset_ids: Vec<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tier,
            timeframe,
            asset_ids,
            jobs: Vec::new(),
            status: BatchStatus::Running,
            total_records: 0,
            success_count: 0,
            failure_count: 0,
            started_at,
            completed_at: None,
        }
    }

    /// 汇总所有任务结果。至少一个任务完成即视为批次完成。
    pub fn finalize(&mut self, now: DateTime<Utc>) {
        self.success_count = self.jobs.iter().filter(|j| j.is_completed()).count();
        self.failure_count = self.jobs.iter().filter(|j| j.is_failed()).count();
        self.total_records = self
            .jobs
            .iter()
            .filter(|j| j.is_completed())
            .map(|j| j.records_collected)
            .sum();
        self.status = if self.success_count > 0 {
            BatchStatus::Completed
        } else {
            BatchStatus::Failed
        };
        self.completed_at = Some(now);
    }

    pub fn successful_assets(&self) -> Vec<String> {
        self.jobs
            .iter()
            .filter(|j| j.is_completed())
            .map(|j| j.asset_id.clone())
            .collect()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.completed_at
            .map(|done| (done - self.started_at).num_milliseconds().max(0) as u64)
            .unwrap_or(0)
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            batch_id: self.id,
            tier: self.tier,
            timeframe: self.timeframe,
            status: self.status,
            job_count: self.jobs.len(),
            success_count: self.success_count,
            failure_count: self.failure_count,
            total_records: self.total_records,
            elapsed_ms: self.elapsed_ms(),
        }
    }
}
