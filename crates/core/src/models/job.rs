use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tier::{TierId, Timeframe};
use crate::errors::{CollectorError, CollectorResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "RETRYING")]
    Retrying,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Running, Completed)
                | (Running, Retrying)
                | (Running, Failed)
                | (Retrying, Running)
                | (Retrying, Failed)
        )
    }
}

/// 单个资产的一次采集任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionJob {
    pub id: Uuid,
    pub tier: TierId,
    pub timeframe: Timeframe,
    pub asset_id: String,
    pub status: JobStatus,
    pub retry_count: u32,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_collected: i64,
    pub error_message: Option<String>,
    pub execution_time_ms: u64,
}

impl CollectionJob {
    pub fn new(
        tier: TierId,
        timeframe: Timeframe,
        asset_id: impl Into<String>,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tier,
            timeframe,
            asset_id: asset_id.into(),
            status: JobStatus::Pending,
            retry_count: 0,
            scheduled_at,
            started_at: None,
            completed_at: None,
            records_collected: 0,
            error_message: None,
            execution_time_ms: 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == JobStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == JobStatus::Failed
    }

    /// 开始（或重试后重新开始）一次尝试
    pub fn start(&mut self, now: DateTime<Utc>) -> CollectorResult<()> {
        self.transition(JobStatus::Running)?;
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        Ok(())
    }

    pub fn mark_retrying(&mut self, error: &CollectorError) -> CollectorResult<()> {
        self.transition(JobStatus::Retrying)?;
        self.retry_count += 1;
        self.error_message = Some(error.to_string());
        Ok(())
    }

    pub fn complete(&mut self, records: i64, now: DateTime<Utc>) -> CollectorResult<()> {
        self.transition(JobStatus::Completed)?;
        self.records_collected = records.max(0);
        self.error_message = None;
        self.finish(now);
        Ok(())
    }

    pub fn fail(&mut self, error: &CollectorError, now: DateTime<Utc>) -> CollectorResult<()> {
        self.transition(JobStatus::Failed)?;
        self.error_message = Some(error.to_string());
        self.finish(now);
        Ok(())
    }

    fn finish(&mut self, now: DateTime<Utc>) {
        self.completed_at = Some(now);
        let started = self.started_at.unwrap_or(now);
        self.execution_time_ms = (now - started).num_milliseconds().max(0) as u64;
    }

    fn transition(&mut self, next: JobStatus) -> CollectorResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CollectorError::Internal(format!(
                "任务 {} 非法的状态转换: {:?} -> {:?}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }
}
