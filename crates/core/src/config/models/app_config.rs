use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    database::DatabaseConfig,
    observability::ObservabilityConfig,
    orchestrator::OrchestratorConfig,
    resilience::{CircuitBreakerSettings, RetrySettings},
    upstream::{FeatureConfig, UpstreamConfig},
};
use crate::models::TierConfig;

/// 默认配置文件搜索路径，按顺序取第一个存在的
pub const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/collector.toml",
    "collector.toml",
    "/etc/tiered-collector/config.toml",
];

/// System configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub upstream: UpstreamConfig,
    pub features: FeatureConfig,
    pub orchestrator: OrchestratorConfig,
    pub retry: RetrySettings,
    pub circuit_breaker: CircuitBreakerSettings,
    pub observability: ObservabilityConfig,
    pub tiers: Vec<TierConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            upstream: UpstreamConfig::default(),
            features: FeatureConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            retry: RetrySettings::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            observability: ObservabilityConfig::default(),
            tiers: TierConfig::default_tiers(),
        }
    }
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Built-in defaults
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (`COLLECTOR_ORCHESTRATOR__SUB_BATCH_SIZE=10`)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        // 字段名本身含下划线，层级之间用双下划线分隔
        builder = builder.add_source(
            Environment::with_prefix("COLLECTOR")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// Validate every section; tier table integrity is checked by the tier manager
    pub fn validate(&self) -> Result<()> {
        self.database.validate().context("数据库配置验证失败")?;
        self.upstream.validate().context("上游服务配置验证失败")?;
        self.features.validate().context("特征服务配置验证失败")?;
        self.orchestrator
            .validate()
            .context("编排器配置验证失败")?;
        self.retry.validate().context("重试配置验证失败")?;
        self.circuit_breaker
            .validate()
            .context("熔断器配置验证失败")?;
        self.observability
            .validate()
            .context("可观测性配置验证失败")?;

        if self.tiers.is_empty() {
            return Err(anyhow::anyhow!("层级配置不能为空"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Timeframe;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tiers.len(), 4);
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [orchestrator]
            max_in_flight_jobs = 8
            sub_batch_size = 4

            [features]
            url = "http://features:8080/trigger"
            "#,
        )
        .unwrap();

        assert_eq!(config.orchestrator.max_in_flight_jobs, 8);
        assert_eq!(config.orchestrator.sub_batch_size, 4);
        assert_eq!(config.orchestrator.tick_interval_ms, 1000);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.features.url.is_some());
        assert_eq!(config.tiers, TierConfig::default_tiers());
    }

    #[test]
    fn test_custom_tier_table() {
        let config = AppConfig::from_toml(
            r#"
            [[tiers]]
            id = 1
            name = "only"
            timeframes = ["1h", "1d"]
            update_interval_seconds = 600
            max_assets = 10
            retention_days = 60
            priority = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.tiers.len(), 1);
        assert_eq!(
            config.tiers[0].timeframes,
            vec![Timeframe::OneHour, Timeframe::OneDay]
        );
    }

    #[test]
    fn test_sub_batch_larger_than_budget_is_rejected() {
        let result = AppConfig::from_toml(
            r#"
            [orchestrator]
            max_in_flight_jobs = 2
            sub_batch_size = 5
            "#,
        );
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("编排器配置验证失败"), "{message}");
    }

    #[test]
    fn test_invalid_sections_are_rejected() {
        assert!(AppConfig::from_toml("[database]\nurl = \"mysql://x\"").is_err());
        assert!(AppConfig::from_toml("[retry]\njitter_factor = 1.5").is_err());
        assert!(AppConfig::from_toml("[circuit_breaker]\nfailure_threshold = 0").is_err());
        assert!(AppConfig::from_toml("[observability]\nlog_level = \"loud\"").is_err());
        assert!(AppConfig::from_toml("[upstream]\nbase_url = \"ftp://x\"").is_err());
        assert!(AppConfig::from_toml("tiers = []").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [database]
            url = "sqlite::memory:"

            [circuit_breaker]
            failure_threshold = 2
            "#
        )
        .unwrap();

        let config = AppConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.circuit_breaker.failure_threshold, 2);
        assert_eq!(config.circuit_breaker.recovery_timeout_seconds, 60);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(AppConfig::load(Some("/nonexistent/collector.toml")).is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AppConfig::default();
        let text = config.to_toml().unwrap();
        let parsed = AppConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.tiers, config.tiers);
    }
}
