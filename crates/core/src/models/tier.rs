use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CollectorError;

pub type TierId = u8;

/// K线周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
}

impl Timeframe {
    pub const ALL: [Timeframe; 6] = [
        Timeframe::OneMinute,
        Timeframe::FiveMinutes,
        Timeframe::FifteenMinutes,
        Timeframe::OneHour,
        Timeframe::FourHours,
        Timeframe::OneDay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1m",
            Timeframe::FiveMinutes => "5m",
            Timeframe::FifteenMinutes => "15m",
            Timeframe::OneHour => "1h",
            Timeframe::FourHours => "4h",
            Timeframe::OneDay => "1d",
        }
    }

    /// 增量采集默认回看天数
    pub fn default_lookback_days(&self) -> u32 {
        match self {
            Timeframe::OneMinute => 1,
            Timeframe::FiveMinutes => 3,
            Timeframe::FifteenMinutes => 7,
            Timeframe::OneHour => 30,
            Timeframe::FourHours => 90,
            Timeframe::OneDay => 365,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = CollectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .iter()
            .copied()
            .find(|tf| tf.as_str() == s.trim())
            .ok_or_else(|| CollectorError::Configuration(format!("无效的周期: {s}")))
    }
}

/// 层级配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierConfig {
    pub id: TierId,
    pub name: String,
    pub timeframes: Vec<Timeframe>,
    pub update_interval_seconds: u64,
    pub max_assets: usize,
    pub retention_days: u32,
    /// 1 为最高优先级
    pub priority: u8,
}

impl TierConfig {
    /// 更新间隔上限：一年
    pub const MAX_UPDATE_INTERVAL_SECONDS: u64 = 365 * 24 * 60 * 60;

    pub fn lookback_days(&self, timeframe: Timeframe) -> u32 {
        timeframe
            .default_lookback_days()
            .min(self.retention_days.max(1))
    }

    pub fn has_timeframe(&self, timeframe: Timeframe) -> bool {
        self.timeframes.contains(&timeframe)
    }

    /// 内置的四层默认配置
    pub fn default_tiers() -> Vec<TierConfig> {
        vec![
            TierConfig {
                id: 1,
                name: "hot".to_string(),
                timeframes: vec![
                    Timeframe::OneMinute,
                    Timeframe::FiveMinutes,
                    Timeframe::FifteenMinutes,
                ],
                update_interval_seconds: 60,
                max_assets: 50,
                retention_days: 30,
                priority: 1,
            },
            TierConfig {
                id: 2,
                name: "active".to_string(),
                timeframes: vec![
                    Timeframe::FiveMinutes,
                    Timeframe::FifteenMinutes,
                    Timeframe::OneHour,
                ],
                update_interval_seconds: 300,
                max_assets: 200,
                retention_days: 90,
                priority: 2,
            },
            TierConfig {
                id: 3,
                name: "standard".to_string(),
                timeframes: vec![Timeframe::OneHour, Timeframe::FourHours],
                update_interval_seconds: 1800,
                max_assets: 500,
                retention_days: 180,
                priority: 3,
            },
            TierConfig {
                id: 4,
                name: "dormant".to_string(),
                timeframes: vec![Timeframe::OneDay],
                update_interval_seconds: 14400,
                max_assets: 2000,
                retention_days: 365,
                priority: 4,
            },
        ]
    }
}

/// 资产层级分配，由外部分类流程写入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetTierAssignment {
    pub asset_id: String,
    pub tier: TierId,
    pub activity_score: f64,
    pub last_tier_change: DateTime<Utc>,
    pub consecutive_high_scores: u32,
    pub consecutive_low_scores: u32,
}

/// 单个层级的统计信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierStatistics {
    pub tier: TierId,
    pub name: String,
    pub priority: u8,
    /// 截断到 max_assets 之后参与采集的资产数
    pub asset_count: usize,
    /// 分配到该层级的全部资产数
    pub assigned_count: usize,
    pub average_activity_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_parse_and_display() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.as_str().parse::<Timeframe>().unwrap(), tf);
            assert_eq!(tf.to_string(), tf.as_str());
        }
        assert!("2m".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_timeframe_serde_uses_short_names() {
        let json = serde_json::to_string(&vec![Timeframe::OneHour, Timeframe::OneDay]).unwrap();
        assert_eq!(json, r#"["1h","1d"]"#);
    }

    #[test]
    fn test_lookback_capped_by_retention() {
        let tiers = TierConfig::default_tiers();
        let hot = &tiers[0];
        assert_eq!(hot.lookback_days(Timeframe::OneMinute), 1);

        let mut short = hot.clone();
        short.retention_days = 5;
        assert_eq!(short.lookback_days(Timeframe::FifteenMinutes), 5);
    }
}
