use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use collector_core::{
    config::OrchestratorConfig, BatchSummary, CollectionBatch, CollectionSchedule, ScheduleKey,
};
use collector_infrastructure::MetricsCollector;

use crate::executor::CollectionExecutor;
use crate::tier_manager::TierManager;

/// 编排循环的节奏：节拍间隔与调度列表刷新间隔
///
/// 并发相关的参数属于 [`crate::ExecutorConfig`]，编排器只读取执行器那一份。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorTiming {
    pub tick_interval: Duration,
    pub refresh_interval: Duration,
}

impl Default for OrchestratorTiming {
    fn default() -> Self {
        Self::from(&OrchestratorConfig::default())
    }
}

impl From<&OrchestratorConfig> for OrchestratorTiming {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            tick_interval: Duration::from_millis(config.tick_interval_ms.max(1)),
            refresh_interval: Duration::from_secs(config.refresh_interval_seconds),
        }
    }
}

/// 单次节拍的处理结果
#[derive(Debug, Default, Clone)]
pub struct TickReport {
    /// 本次节拍是否成功刷新了调度列表
    pub refreshed: bool,
    /// 本次派发执行的调度
    pub dispatched: Vec<ScheduleKey>,
    /// 因并发额度不足顺延到下个节拍的调度
    pub deferred: Vec<ScheduleKey>,
    /// 自上次节拍以来完成的批次
    pub completed: Vec<BatchSummary>,
}

/// 采集编排器
///
/// 拥有调度列表和在途调度集合，每个节拍：回收已完成的调度、按需刷新、
/// 按 (优先级, 到期时间) 顺序派发到期调度。同一调度不会并发执行两次。
pub struct CollectionOrchestrator {
    tier_manager: Arc<TierManager>,
    executor: Arc<CollectionExecutor>,
    timing: OrchestratorTiming,
    metrics: Arc<MetricsCollector>,
    shutdown_grace: Duration,
    schedules: Vec<CollectionSchedule>,
    last_refresh: Option<DateTime<Utc>>,
    in_flight: HashSet<ScheduleKey>,
    running: JoinSet<(ScheduleKey, CollectionBatch)>,
    task_keys: HashMap<Id, ScheduleKey>,
}

impl CollectionOrchestrator {
    pub fn new(
        tier_manager: Arc<TierManager>,
        executor: Arc<CollectionExecutor>,
        timing: OrchestratorTiming,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            tier_manager,
            executor,
            timing,
            metrics,
            shutdown_grace: Duration::from_secs(30),
            schedules: Vec::new(),
            last_refresh: None,
            in_flight: HashSet::new(),
            running: JoinSet::new(),
            task_keys: HashMap::new(),
        }
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn schedules(&self) -> &[CollectionSchedule] {
        &self.schedules
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// 主循环，直到收到关闭信号；随后在宽限期内等待在途调度完成
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.timing.tick_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            tick_interval_ms = self.timing.tick_interval.as_millis() as u64,
            refresh_interval_seconds = self.timing.refresh_interval.as_secs(),
            "采集编排器已启动"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.tick(Utc::now()).await;
                    if !report.dispatched.is_empty() || !report.deferred.is_empty() {
                        debug!(
                            dispatched = report.dispatched.len(),
                            deferred = report.deferred.len(),
                            completed = report.completed.len(),
                            "节拍处理完成"
                        );
                    }
                }
                _ = shutdown.recv() => {
                    info!("收到关闭信号，停止派发新调度");
                    break;
                }
            }
        }

        let in_flight = self.in_flight.len();
        if in_flight > 0 {
            info!(in_flight, "等待在途调度完成");
        }
        match tokio::time::timeout(self.shutdown_grace, self.drain()).await {
            Ok(summaries) => info!(completed = summaries.len(), "采集编排器已停止"),
            Err(_) => {
                warn!(
                    grace_seconds = self.shutdown_grace.as_secs(),
                    "宽限期内未能完成全部调度，强制中止"
                );
                self.running.abort_all();
            }
        }
    }

    /// 处理一个节拍
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport {
            completed: self.reap_finished(now),
            ..Default::default()
        };

        if self.refresh_due(now) {
            report.refreshed = self.refresh(now).await;
        }

        self.dispatch_due(now, &mut report);

        let slots = self.executor.job_slots();
        self.metrics.update_in_flight_jobs(
            self.executor
                .config()
                .max_in_flight_jobs
                .saturating_sub(slots.available_permits()),
        );
        self.metrics.update_deferred_schedules(report.deferred.len());

        report
    }

    /// 等待所有在途调度完成
    pub async fn drain(&mut self) -> Vec<BatchSummary> {
        let mut summaries = Vec::new();
        while let Some(result) = self.running.join_next_with_id().await {
            if let Some(summary) = self.handle_finished(result, Utc::now()) {
                summaries.push(summary);
            }
        }
        summaries
    }

    fn reap_finished(&mut self, now: DateTime<Utc>) -> Vec<BatchSummary> {
        let mut summaries = Vec::new();
        while let Some(result) = self.running.try_join_next_with_id() {
            if let Some(summary) = self.handle_finished(result, now) {
                summaries.push(summary);
            }
        }
        summaries
    }

    fn handle_finished(
        &mut self,
        result: Result<(Id, (ScheduleKey, CollectionBatch)), JoinError>,
        now: DateTime<Utc>,
    ) -> Option<BatchSummary> {
        match result {
            Ok((id, (key, batch))) => {
                self.task_keys.remove(&id);
                self.in_flight.remove(&key);
                self.advance(key, batch.completed_at.unwrap_or(now));
                Some(batch.summary())
            }
            Err(join_error) => {
                let key = self.task_keys.remove(&join_error.id());
                error!(schedule = ?key, "调度执行任务异常退出: {}", join_error);
                if let Some(key) = key {
                    self.in_flight.remove(&key);
                    // 推进一次，避免下个节拍立即重复执行
                    self.advance(key, now);
                }
                None
            }
        }
    }

    fn advance(&mut self, key: ScheduleKey, completed_at: DateTime<Utc>) {
        if let Some(schedule) = self.schedules.iter_mut().find(|s| s.key() == key) {
            TierManager::update_after_execution(schedule, completed_at);
        }
    }

    fn refresh_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_refresh {
            None => true,
            Some(last) => {
                let elapsed = (now - last).to_std().unwrap_or_default();
                elapsed >= self.timing.refresh_interval
            }
        }
    }

    /// 刷新调度列表；失败时保留旧列表，下个节拍重试
    async fn refresh(&mut self, now: DateTime<Utc>) -> bool {
        let started = Instant::now();
        match self.tier_manager.refresh(&self.schedules, now).await {
            Ok(schedules) => {
                self.metrics
                    .record_schedule_refresh(true, started.elapsed().as_secs_f64());
                info!(
                    previous = self.schedules.len(),
                    current = schedules.len(),
                    "调度列表已刷新"
                );
                self.schedules = schedules;
                self.last_refresh = Some(now);
                self.publish_tier_statistics().await;
                true
            }
            Err(e) => {
                self.metrics
                    .record_schedule_refresh(false, started.elapsed().as_secs_f64());
                warn!(
                    error = %e,
                    kept = self.schedules.len(),
                    "刷新调度列表失败，沿用旧列表"
                );
                false
            }
        }
    }

    async fn publish_tier_statistics(&self) {
        match self.tier_manager.tier_statistics().await {
            Ok(stats) => {
                for tier in &stats {
                    self.metrics.update_tier_statistics(tier);
                    debug!(
                        tier = tier.tier,
                        name = %tier.name,
                        assets = tier.asset_count,
                        assigned = tier.assigned_count,
                        avg_score = tier.average_activity_score,
                        "层级统计"
                    );
                }
            }
            Err(e) => debug!(error = %e, "获取层级统计失败"),
        }
    }

    fn dispatch_due(&mut self, now: DateTime<Utc>, report: &mut TickReport) {
        let mut due: Vec<CollectionSchedule> = TierManager::filter_due(&self.schedules, now)
            .into_iter()
            .filter(|schedule| !self.in_flight.contains(&schedule.key()))
            .collect();
        due.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.next_run_at.cmp(&b.next_run_at))
        });

        let slots = self.executor.job_slots();
        let mut deferring = false;

        for schedule in due {
            let key = schedule.key();
            if deferring {
                report.deferred.push(key);
                continue;
            }

            let permits = self.executor.permits_for(schedule.asset_ids.len());
            let permit = match slots.clone().try_acquire_many_owned(permits) {
                Ok(permit) => permit,
                Err(_) => {
                    // 额度不足：本调度及其后所有到期调度顺延
                    deferring = true;
                    report.deferred.push(key);
                    continue;
                }
            };

            let executor = self.executor.clone();
            let handle = self.running.spawn(async move {
                let _permit = permit;
                let batch = executor.execute_schedule(&schedule).await;
                (key, batch)
            });

            self.task_keys.insert(handle.id(), key);
            self.in_flight.insert(key);
            report.dispatched.push(key);
        }

        if !report.deferred.is_empty() {
            info!(
                deferred = report.deferred.len(),
                available = slots.available_permits(),
                "并发额度不足，部分调度顺延到下个节拍"
            );
        }
    }
}
