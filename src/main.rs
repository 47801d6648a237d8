use std::time::Duration;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, Command};
use collector_core::{AppConfig, TierId, Timeframe};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tiered_collector::app::Application;
use tiered_collector::shutdown::{wait_for_shutdown_signal, ShutdownManager};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let config = AppConfig::load(config_path).context("加载配置失败")?;

    // 命令行优先于配置文件
    let log_level = matches
        .get_one::<String>("log-level")
        .cloned()
        .unwrap_or_else(|| config.observability.log_level.clone());
    let log_format = matches
        .get_one::<String>("log-format")
        .map(String::as_str)
        .unwrap_or("pretty");
    init_logging(&log_level, log_format)?;

    info!("启动分层行情采集调度系统");
    if let Some(path) = config_path {
        info!("配置文件: {path}");
    }

    let app = Application::new(config).await?;

    if let Some(tier) = matches.get_one::<TierId>("trigger-tier").copied() {
        let timeframe = matches
            .get_one::<String>("timeframe")
            .map(|tf| tf.parse::<Timeframe>())
            .transpose()?;
        return run_trigger(app, tier, timeframe).await;
    }

    run_service(app).await
}

fn cli() -> Command {
    Command::new("tiered-collector")
        .version(env!("CARGO_PKG_VERSION"))
        .about("分层行情数据采集调度系统")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，缺省时按默认路径搜索"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，缺省时使用配置文件中的值")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"])
                .default_value("pretty"),
        )
        .arg(
            Arg::new("trigger-tier")
                .long("trigger-tier")
                .value_name("TIER")
                .help("立即执行指定层级的采集后退出")
                .value_parser(value_parser!(u8)),
        )
        .arg(
            Arg::new("timeframe")
                .long("timeframe")
                .value_name("TF")
                .help("与 --trigger-tier 一起使用，只执行指定周期")
                .requires("trigger-tier"),
        )
}

/// 常驻模式
async fn run_service(app: Application) -> Result<()> {
    let shutdown_manager = ShutdownManager::new();
    let shutdown_rx = shutdown_manager.subscribe().await;

    let mut app_handle = tokio::spawn(async move { app.run(shutdown_rx).await });

    tokio::select! {
        _ = wait_for_shutdown_signal() => {
            info!("收到关闭信号，开始优雅关闭...");
            shutdown_manager.shutdown().await;
        }
        result = &mut app_handle => {
            // 编排器提前退出，通常是启动阶段失败
            return match result {
                Ok(inner) => inner,
                Err(e) => Err(anyhow::anyhow!("应用任务异常退出: {e}")),
            };
        }
    }

    // 编排器自身有30秒宽限期，这里额外留出余量
    match tokio::time::timeout(Duration::from_secs(35), app_handle).await {
        Ok(Ok(Ok(()))) => info!("应用已优雅关闭"),
        Ok(Ok(Err(e))) => error!("应用关闭时发生错误: {e:#}"),
        Ok(Err(e)) => error!("应用任务异常退出: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }

    info!("分层行情采集调度系统已退出");
    Ok(())
}

/// 手动触发模式：执行一次并以JSON输出批次摘要
async fn run_trigger(app: Application, tier: TierId, timeframe: Option<Timeframe>) -> Result<()> {
    let result = app.trigger(tier, timeframe).await;
    app.close().await;

    let summaries = result?;
    println!(
        "{}",
        serde_json::to_string_pretty(&summaries).context("序列化批次摘要失败")?
    );
    Ok(())
}

/// 初始化日志系统
fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
        _ => {
            return Err(anyhow::anyhow!("不支持的日志格式: {log_format}"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_trigger_arguments() {
        let matches = cli()
            .try_get_matches_from(["tiered-collector", "--trigger-tier", "2", "--timeframe", "1h"])
            .unwrap();
        assert_eq!(matches.get_one::<u8>("trigger-tier"), Some(&2));
        assert_eq!(matches.get_one::<String>("timeframe").unwrap(), "1h");
    }

    #[test]
    fn test_timeframe_requires_trigger_tier() {
        assert!(cli()
            .try_get_matches_from(["tiered-collector", "--timeframe", "1h"])
            .is_err());
    }

    #[test]
    fn test_log_level_is_optional() {
        let matches: clap::ArgMatches = cli().try_get_matches_from(["tiered-collector"]).unwrap();
        assert!(matches.get_one::<String>("log-level").is_none());
        assert_eq!(matches.get_one::<String>("log-format").unwrap(), "pretty");
    }
}
