use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use collector_core::{
    AssetTierAssignment, CollectionSchedule, CollectorError, CollectorResult, ScheduleKey,
    TierConfig, TierId, TierStatistics, TierStore, Timeframe,
};

/// 层级管理器
///
/// 持有校验过的静态层级配置（按优先级排序），把层级分配快照转换为采集调度。
pub struct TierManager {
    tiers: Vec<TierConfig>,
    store: Arc<dyn TierStore>,
}

impl TierManager {
    /// 创建层级管理器，配置不合法时直接失败
    pub fn new(mut tiers: Vec<TierConfig>, store: Arc<dyn TierStore>) -> CollectorResult<Self> {
        Self::validate_integrity(&tiers)?;
        tiers.sort_by_key(|tier| tier.priority);

        info!(
            tiers = tiers.len(),
            "层级配置校验通过: {}",
            tiers
                .iter()
                .map(|t| format!("{}({}s)", t.name, t.update_interval_seconds))
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self { tiers, store })
    }

    /// 校验层级配置表
    ///
    /// 优先级两两不同，且优先级数字越大更新间隔越长（严格递增）。
    pub fn validate_integrity(configs: &[TierConfig]) -> CollectorResult<()> {
        if configs.is_empty() {
            return Err(CollectorError::Configuration("层级配置不能为空".to_string()));
        }

        let mut ids = HashSet::new();
        let mut priorities = HashSet::new();
        for tier in configs {
            if !ids.insert(tier.id) {
                return Err(CollectorError::Configuration(format!(
                    "层级编号重复: {}",
                    tier.id
                )));
            }
            if !priorities.insert(tier.priority) {
                return Err(CollectorError::Configuration(format!(
                    "层级优先级重复: {} (层级 {})",
                    tier.priority, tier.id
                )));
            }
            if tier.timeframes.is_empty() {
                return Err(CollectorError::Configuration(format!(
                    "层级 {} 未配置任何周期",
                    tier.id
                )));
            }
            if tier.update_interval_seconds == 0 {
                return Err(CollectorError::Configuration(format!(
                    "层级 {} 的更新间隔必须大于0",
                    tier.id
                )));
            }
            if tier.update_interval_seconds > TierConfig::MAX_UPDATE_INTERVAL_SECONDS {
                return Err(CollectorError::Configuration(format!(
                    "层级 {} 的更新间隔 {}s 超过上限 {}s",
                    tier.id,
                    tier.update_interval_seconds,
                    TierConfig::MAX_UPDATE_INTERVAL_SECONDS
                )));
            }
            if tier.max_assets == 0 {
                return Err(CollectorError::Configuration(format!(
                    "层级 {} 的最大资产数必须大于0",
                    tier.id
                )));
            }
        }

        let mut by_priority: Vec<&TierConfig> = configs.iter().collect();
        by_priority.sort_by_key(|tier| tier.priority);
        for pair in by_priority.windows(2) {
            if pair[0].update_interval_seconds >= pair[1].update_interval_seconds {
                return Err(CollectorError::Configuration(format!(
                    "层级 {} (优先级 {}) 的更新间隔 {}s 必须小于层级 {} (优先级 {}) 的 {}s",
                    pair[0].id,
                    pair[0].priority,
                    pair[0].update_interval_seconds,
                    pair[1].id,
                    pair[1].priority,
                    pair[1].update_interval_seconds
                )));
            }
        }

        Ok(())
    }

    /// 按优先级排序的层级配置
    pub fn tiers(&self) -> &[TierConfig] {
        &self.tiers
    }

    pub fn tier(&self, id: TierId) -> CollectorResult<&TierConfig> {
        self.tiers
            .iter()
            .find(|tier| tier.id == id)
            .ok_or(CollectorError::TierNotFound { tier: id })
    }

    pub fn lookback_days(&self, tier: TierId, timeframe: Timeframe) -> CollectorResult<u32> {
        Ok(self.tier(tier)?.lookback_days(timeframe))
    }

    /// 从快照中选出某层级的资产：活跃度降序，同分按资产标识升序，截断到 `max_assets`
    pub fn assets_for_tier(tier: &TierConfig, assignments: &[AssetTierAssignment]) -> Vec<String> {
        let mut selected: Vec<&AssetTierAssignment> =
            assignments.iter().filter(|a| a.tier == tier.id).collect();

        selected.sort_by(|a, b| {
            b.activity_score
                .total_cmp(&a.activity_score)
                .then_with(|| a.asset_id.cmp(&b.asset_id))
        });

        selected
            .into_iter()
            .take(tier.max_assets)
            .map(|a| a.asset_id.clone())
            .collect()
    }

    /// 读取存储并返回某层级当前的资产列表
    #[instrument(skip(self))]
    pub async fn get_assets_by_tier(&self, tier: TierId) -> CollectorResult<Vec<String>> {
        let config = self.tier(tier)?;
        let assignments = self.store.get_tier_assignments().await?;
        Ok(Self::assets_for_tier(config, &assignments))
    }

    /// 由一次快照生成全部调度，按 (优先级, 下次执行时间) 排序
    pub fn build_schedules(
        &self,
        assignments: &[AssetTierAssignment],
        now: DateTime<Utc>,
    ) -> Vec<CollectionSchedule> {
        let mut schedules = Vec::new();

        for tier in &self.tiers {
            let assets = Self::assets_for_tier(tier, assignments);
            if assets.is_empty() {
                debug!(tier = tier.id, "层级没有资产，跳过");
                continue;
            }

            for timeframe in &tier.timeframes {
                schedules.push(CollectionSchedule::new(
                    tier.id,
                    tier.priority,
                    *timeframe,
                    assets.clone(),
                    tier.update_interval_seconds,
                    now,
                ));
            }
        }

        sort_schedules(&mut schedules);
        schedules
    }

    /// 读取一次快照并生成调度
    #[instrument(skip(self))]
    pub async fn generate_schedules(
        &self,
        now: DateTime<Utc>,
    ) -> CollectorResult<Vec<CollectionSchedule>> {
        let assignments = self.store.get_tier_assignments().await?;
        let schedules = self.build_schedules(&assignments, now);

        info!(
            schedules = schedules.len(),
            assignments = assignments.len(),
            "调度已生成"
        );
        Ok(schedules)
    }

    /// 重新生成调度，同一 (层级, 周期) 保留旧的下次执行时间
    pub async fn refresh(
        &self,
        old: &[CollectionSchedule],
        now: DateTime<Utc>,
    ) -> CollectorResult<Vec<CollectionSchedule>> {
        let fresh = self.generate_schedules(now).await?;
        Ok(Self::merge_schedules(old, fresh))
    }

    /// 资产集合取自新快照；旧列表中存在的 key 沿用旧的 `next_run_at`，消失的 key 被丢弃
    pub fn merge_schedules(
        old: &[CollectionSchedule],
        fresh: Vec<CollectionSchedule>,
    ) -> Vec<CollectionSchedule> {
        let previous: HashMap<ScheduleKey, DateTime<Utc>> = old
            .iter()
            .map(|schedule| (schedule.key(), schedule.next_run_at))
            .collect();

        let mut merged: Vec<CollectionSchedule> = fresh
            .into_iter()
            .map(|mut schedule| {
                if let Some(next_run_at) = previous.get(&schedule.key()) {
                    schedule.next_run_at = *next_run_at;
                }
                schedule
            })
            .collect();

        sort_schedules(&mut merged);
        merged
    }

    /// 到期的调度（`next_run_at <= now`），保持输入顺序
    pub fn filter_due(schedules: &[CollectionSchedule], now: DateTime<Utc>) -> Vec<CollectionSchedule> {
        schedules
            .iter()
            .filter(|schedule| schedule.is_due(now))
            .cloned()
            .collect()
    }

    /// 执行完成后以完成时间推进下次执行时间
    pub fn update_after_execution(schedule: &mut CollectionSchedule, completed_at: DateTime<Utc>) {
        schedule.advance(completed_at);
    }

    /// 由快照计算各层级统计，按优先级排序
    pub fn statistics_from(&self, assignments: &[AssetTierAssignment]) -> Vec<TierStatistics> {
        let mut scores: BTreeMap<TierId, (usize, f64)> = BTreeMap::new();
        for assignment in assignments {
            let entry = scores.entry(assignment.tier).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += assignment.activity_score;
        }

        self.tiers
            .iter()
            .map(|tier| {
                let (assigned_count, total_score) =
                    scores.get(&tier.id).copied().unwrap_or((0, 0.0));
                TierStatistics {
                    tier: tier.id,
                    name: tier.name.clone(),
                    priority: tier.priority,
                    asset_count: assigned_count.min(tier.max_assets),
                    assigned_count,
                    average_activity_score: if assigned_count == 0 {
                        0.0
                    } else {
                        total_score / assigned_count as f64
                    },
                }
            })
            .collect()
    }

    pub async fn tier_statistics(&self) -> CollectorResult<Vec<TierStatistics>> {
        let assignments = self.store.get_tier_assignments().await?;
        Ok(self.statistics_from(&assignments))
    }
}

fn sort_schedules(schedules: &mut [CollectionSchedule]) {
    schedules.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.next_run_at.cmp(&b.next_run_at))
            .then_with(|| a.timeframe.cmp(&b.timeframe))
    });
}
