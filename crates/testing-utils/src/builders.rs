//! Test data builders with sensible defaults

use chrono::Utc;
use collector_core::{AssetTierAssignment, TierConfig, TierId, Timeframe};

/// Builder for creating test TierConfig values
pub struct TierConfigBuilder {
    tier: TierConfig,
}

impl TierConfigBuilder {
    /// Defaults: priority equals id, interval `60 * id` seconds, one `1h` timeframe
    pub fn new(id: TierId) -> Self {
        Self {
            tier: TierConfig {
                id,
                name: format!("tier-{id}"),
                timeframes: vec![Timeframe::OneHour],
                update_interval_seconds: 60 * u64::from(id.max(1)),
                max_assets: 100,
                retention_days: 365,
                priority: id,
            },
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.tier.name = name.to_string();
        self
    }

    pub fn with_timeframes(mut self, timeframes: Vec<Timeframe>) -> Self {
        self.tier.timeframes = timeframes;
        self
    }

    pub fn with_interval(mut self, seconds: u64) -> Self {
        self.tier.update_interval_seconds = seconds;
        self
    }

    pub fn with_max_assets(mut self, max_assets: usize) -> Self {
        self.tier.max_assets = max_assets;
        self
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.tier.retention_days = days;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.tier.priority = priority;
        self
    }

    pub fn build(self) -> TierConfig {
        self.tier
    }
}

/// Builder for creating test AssetTierAssignment values
pub struct AssignmentBuilder {
    assignment: AssetTierAssignment,
}

impl AssignmentBuilder {
    pub fn new(asset_id: &str) -> Self {
        Self {
            assignment: AssetTierAssignment {
                asset_id: asset_id.to_string(),
                tier: 1,
                activity_score: 0.5,
                last_tier_change: Utc::now(),
                consecutive_high_scores: 0,
                consecutive_low_scores: 0,
            },
        }
    }

    pub fn with_tier(mut self, tier: TierId) -> Self {
        self.assignment.tier = tier;
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.assignment.activity_score = score;
        self
    }

    pub fn build(self) -> AssetTierAssignment {
        self.assignment
    }
}

/// `count` assets named `{prefix}{i}` in `tier`, scores descending from 1.0
pub fn assignments_for_tier(prefix: &str, tier: TierId, count: usize) -> Vec<AssetTierAssignment> {
    (0..count)
        .map(|i| {
            AssignmentBuilder::new(&format!("{prefix}{i}"))
                .with_tier(tier)
                .with_score(1.0 - i as f64 / (count.max(1) as f64 * 2.0))
                .build()
        })
        .collect()
}
