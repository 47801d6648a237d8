use collector_core::config::AppConfig;
use collector_core::{TierConfig, Timeframe};

const SAMPLE_CONFIG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/collector.toml");

// 环境变量是进程级的，文件加载与覆盖放在同一个测试里顺序执行
#[test]
fn test_sample_config_and_environment_overrides() {
    let config = AppConfig::load(Some(SAMPLE_CONFIG)).unwrap();
    assert_eq!(config.tiers, TierConfig::default_tiers());
    assert!(config.features.url.is_none());
    assert_eq!(config.orchestrator.sub_batch_size, 5);
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.circuit_breaker.monitoring_window_seconds, 120);
    assert_eq!(config.tiers[3].timeframes, vec![Timeframe::OneDay]);

    std::env::set_var("COLLECTOR_ORCHESTRATOR__SUB_BATCH_SIZE", "3");
    std::env::set_var("COLLECTOR_RETRY__MAX_ATTEMPTS", "5");
    let overridden = AppConfig::load(Some(SAMPLE_CONFIG));
    std::env::remove_var("COLLECTOR_ORCHESTRATOR__SUB_BATCH_SIZE");
    std::env::remove_var("COLLECTOR_RETRY__MAX_ATTEMPTS");

    let overridden = overridden.unwrap();
    assert_eq!(overridden.orchestrator.sub_batch_size, 3);
    assert_eq!(overridden.retry.max_attempts, 5);
    assert_eq!(overridden.orchestrator.max_in_flight_jobs, 20);
}
