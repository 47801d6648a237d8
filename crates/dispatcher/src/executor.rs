use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, info_span, warn, Instrument};

use collector_core::{
    config::OrchestratorConfig, CircuitBreaker, CircuitState, CollectionBatch, CollectionJob,
    CollectionSchedule, CollectorError, CollectorResult, DataCollector, FeaturePipeline,
    RetryEvent, RetryPolicy, TierId, TierStore, Timeframe,
};
use collector_infrastructure::MetricsCollector;

use crate::tier_manager::TierManager;

/// 执行器配置
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// 每个子批次并发执行的任务数
    pub sub_batch_size: usize,
    /// 子批次之间的固定间隔
    pub sub_batch_delay: Duration,
    /// 全局同时执行的任务上限
    pub max_in_flight_jobs: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::from(&OrchestratorConfig::default())
    }
}

impl From<&OrchestratorConfig> for ExecutorConfig {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            sub_batch_size: config.sub_batch_size,
            sub_batch_delay: Duration::from_millis(config.sub_batch_delay_ms),
            max_in_flight_jobs: config.max_in_flight_jobs,
        }
    }
}

/// 采集执行器
///
/// 把一个调度展开为逐资产的任务，分子批次并发执行，每个任务经过
/// 重试策略和熔断器调用上游。任务失败只记录在任务上，不会向外传播。
pub struct CollectionExecutor {
    tier_manager: Arc<TierManager>,
    collector: Arc<dyn DataCollector>,
    store: Arc<dyn TierStore>,
    features: Option<Arc<dyn FeaturePipeline>>,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
    job_slots: Arc<Semaphore>,
    config: ExecutorConfig,
    metrics: Arc<MetricsCollector>,
}

impl CollectionExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tier_manager: Arc<TierManager>,
        collector: Arc<dyn DataCollector>,
        store: Arc<dyn TierStore>,
        features: Option<Arc<dyn FeaturePipeline>>,
        retry: RetryPolicy,
        breaker: CircuitBreaker,
        config: ExecutorConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let job_slots = Arc::new(Semaphore::new(config.max_in_flight_jobs.max(1)));
        Self {
            tier_manager,
            collector,
            store,
            features,
            retry,
            breaker,
            job_slots,
            config,
            metrics,
        }
    }

    /// 全局任务并发额度，编排器在派发调度前从这里预留
    pub fn job_slots(&self) -> Arc<Semaphore> {
        self.job_slots.clone()
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// 一个调度需要预留的并发额度
    pub fn permits_for(&self, asset_count: usize) -> u32 {
        let permits = self.config.sub_batch_size.min(asset_count).max(1);
        u32::try_from(permits).unwrap_or(u32::MAX)
    }

    /// 执行一个调度，返回汇总后的批次
    ///
    /// 调用方负责持有并发额度。
    pub async fn execute_schedule(&self, schedule: &CollectionSchedule) -> CollectionBatch {
        let span = info_span!(
            "execute_schedule",
            tier = schedule.tier,
            timeframe = %schedule.timeframe,
            assets = schedule.asset_ids.len()
        );

        async {
            let started_at = Utc::now();
            let mut batch = CollectionBatch::new(
                schedule.tier,
                schedule.timeframe,
                schedule.asset_ids.clone(),
                started_at,
            );
            info!(batch_id = %batch.id, "开始执行采集批次 {}", schedule.key());

            let sub_batches: Vec<&[String]> = schedule
                .asset_ids
                .chunks(self.config.sub_batch_size.max(1))
                .collect();

            for (index, assets) in sub_batches.iter().enumerate() {
                let jobs = assets.iter().map(|asset_id| {
                    self.execute_job(CollectionJob::new(
                        schedule.tier,
                        schedule.timeframe,
                        asset_id.clone(),
                        started_at,
                    ))
                });
                batch.jobs.extend(join_all(jobs).await);

                debug!(
                    sub_batch = index + 1,
                    total = sub_batches.len(),
                    "子批次执行完成"
                );

                if index + 1 < sub_batches.len() && !self.config.sub_batch_delay.is_zero() {
                    tokio::time::sleep(self.config.sub_batch_delay).await;
                }
            }

            batch.finalize(Utc::now());
            let summary = batch.summary();
            self.metrics.record_batch(&summary);

            info!(
                batch_id = %summary.batch_id,
                status = ?summary.status,
                success = summary.success_count,
                failed = summary.failure_count,
                records = summary.total_records,
                elapsed_ms = summary.elapsed_ms,
                "采集批次完成"
            );

            if summary.failure_count > 0 {
                self.log_breaker_health().await;
            }

            if batch.success_count > 0 {
                self.notify_features(&batch).await;
            }

            batch
        }
        .instrument(span)
        .await
    }

    /// 熔断器未闭合时输出其统计，便于区分上游整体故障与个别资产失败
    async fn log_breaker_health(&self) {
        let stats = self.breaker.stats().await;
        if stats.state == CircuitState::Closed {
            return;
        }
        warn!(
            breaker = self.breaker.name(),
            state = ?stats.state,
            consecutive_failures = stats.consecutive_failures,
            rejected_calls = stats.rejected_calls,
            failure_rate = stats.failure_rate(),
            success_rate = stats.success_rate(),
            "上游熔断器未闭合"
        );
    }

    async fn notify_features(&self, batch: &CollectionBatch) {
        let Some(features) = &self.features else {
            return;
        };

        let assets = batch.successful_assets();
        if let Err(e) = features.trigger(batch.tier, batch.timeframe, &assets).await {
            // 特征计算失败不影响批次结果
            warn!(batch_id = %batch.id, error = %e, "触发特征计算失败");
        }
    }

    /// 执行单个采集任务，总是返回终态（完成或失败）的任务
    pub async fn execute_job(&self, mut job: CollectionJob) -> CollectionJob {
        let lookback_days = self
            .tier_manager
            .lookback_days(job.tier, job.timeframe)
            .unwrap_or_else(|_| job.timeframe.default_lookback_days());

        let asset_id = job.asset_id.clone();
        let asset: &str = &asset_id;
        let timeframe = job.timeframe;
        let collector: &dyn DataCollector = self.collector.as_ref();
        let breaker = &self.breaker;
        let metrics = &self.metrics;

        let outcome = self
            .retry
            .execute_with_hook(
                move || async move {
                    breaker
                        .execute(move || async move {
                            if collector.collect(asset, timeframe, lookback_days).await? {
                                Ok(())
                            } else {
                                Err(CollectorError::CollectionRejected {
                                    asset_id: asset.to_string(),
                                    timeframe: timeframe.to_string(),
                                })
                            }
                        })
                        .await
                },
                |event| match event {
                    RetryEvent::Attempt { attempt } => {
                        if let Err(e) = job.start(Utc::now()) {
                            error!(job_id = %job.id, attempt, "任务状态更新失败: {}", e);
                        }
                    }
                    RetryEvent::Retrying {
                        attempt,
                        error,
                        delay,
                    } => {
                        warn!(
                            job_id = %job.id,
                            asset_id = %job.asset_id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error_kind = error.kind(),
                            "采集失败，等待重试: {}",
                            error
                        );
                        metrics.record_job_retry();
                        if let Err(e) = job.mark_retrying(error) {
                            error!(job_id = %job.id, "任务状态更新失败: {}", e);
                        }
                    }
                },
            )
            .await;

        let finished_at = Utc::now();
        let transition = match outcome.result {
            Ok(()) => {
                let since = job.started_at.unwrap_or(job.scheduled_at);
                let records = match self
                    .store
                    .count_records_since(&job.asset_id, job.timeframe, since)
                    .await
                {
                    Ok(count) => count,
                    Err(e) => {
                        warn!(asset_id = %job.asset_id, error = %e, "统计采集记录数失败，按0条计");
                        0
                    }
                };
                job.complete(records, finished_at)
            }
            Err(e) => {
                if e.is_circuit_open() {
                    self.metrics.record_circuit_rejection();
                }
                warn!(
                    job_id = %job.id,
                    asset_id = %job.asset_id,
                    timeframe = %job.timeframe,
                    attempts = outcome.attempts,
                    error_kind = e.kind(),
                    "采集任务失败: {}",
                    e
                );
                job.fail(&e, finished_at)
            }
        };

        if let Err(e) = transition {
            error!(job_id = %job.id, "任务无法进入终态: {}", e);
        }

        self.metrics.record_job(&job);
        job
    }

    /// 管理员触发：忽略下次执行时间，立即执行某层级的一个或全部周期
    ///
    /// 每个周期产生一个批次，即使该层级当前没有资产。
    pub async fn execute_immediately(
        &self,
        tier: TierId,
        timeframe: Option<Timeframe>,
    ) -> CollectorResult<Vec<CollectionBatch>> {
        let config = self.tier_manager.tier(tier)?;

        let timeframes = match timeframe {
            Some(tf) if config.has_timeframe(tf) => vec![tf],
            Some(tf) => {
                return Err(CollectorError::Configuration(format!(
                    "层级 {tier} 未配置周期 {tf}"
                )))
            }
            None => config.timeframes.clone(),
        };
        let priority = config.priority;
        let interval = config.update_interval_seconds;

        let assets = self.tier_manager.get_assets_by_tier(tier).await?;
        info!(
            tier,
            assets = assets.len(),
            timeframes = timeframes.len(),
            "手动触发层级采集"
        );

        let mut batches = Vec::with_capacity(timeframes.len());
        for tf in timeframes {
            let permits = self.permits_for(assets.len());
            let _permit = self
                .job_slots
                .clone()
                .acquire_many_owned(permits)
                .await
                .map_err(|e| CollectorError::Internal(format!("并发额度已关闭: {e}")))?;

            let schedule =
                CollectionSchedule::new(tier, priority, tf, assets.clone(), interval, Utc::now());
            batches.push(self.execute_schedule(&schedule).await);
        }

        Ok(batches)
    }
}
