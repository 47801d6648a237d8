use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use collector_core::{
    AppConfig, BatchSummary, CircuitBreaker, CircuitBreakerConfig, DataCollector,
    FeaturePipeline, RetryConfig, RetryPolicy, TierId, Timeframe,
};
use collector_dispatcher::{
    CollectionExecutor, CollectionOrchestrator, ExecutorConfig, OrchestratorTiming, TierManager,
};
use collector_infrastructure::{
    install_prometheus_exporter, DatabaseManager, HttpDataCollector, HttpFeaturePipeline,
    MetricsCollector,
};
use tokio::sync::broadcast;
use tracing::info;

/// 主应用程序：按配置组装存储、上游客户端、执行器和编排器
pub struct Application {
    config: AppConfig,
    database: DatabaseManager,
    tier_manager: Arc<TierManager>,
    executor: Arc<CollectionExecutor>,
    metrics: Arc<MetricsCollector>,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!(
            tiers = config.tiers.len(),
            database = %config.database.url.split(':').next().unwrap_or_default(),
            "初始化应用程序"
        );

        let database = DatabaseManager::new(&config.database)
            .await
            .context("创建数据库连接池失败")?;
        database
            .health_check()
            .await
            .context("数据库健康检查失败")?;
        let store = database.tier_store();

        let collector: Arc<dyn DataCollector> = Arc::new(
            HttpDataCollector::new(&config.upstream).context("创建上游采集客户端失败")?,
        );

        let features = match &config.features.url {
            Some(url) => {
                let pipeline = HttpFeaturePipeline::new(
                    url.clone(),
                    Duration::from_secs(config.upstream.request_timeout_seconds),
                )
                .context("创建特征服务客户端失败")?;
                info!(url = %url, "已启用特征计算通知");
                Some(Arc::new(pipeline) as Arc<dyn FeaturePipeline>)
            }
            None => None,
        };

        let tier_manager = Arc::new(
            TierManager::new(config.tiers.clone(), store.clone()).context("层级配置无效")?,
        );

        let metrics = Arc::new(MetricsCollector::new());
        let executor = Arc::new(CollectionExecutor::new(
            tier_manager.clone(),
            collector,
            store,
            features,
            RetryPolicy::new(RetryConfig::from(&config.retry)),
            CircuitBreaker::with_config(
                "upstream",
                CircuitBreakerConfig::from(&config.circuit_breaker),
            ),
            ExecutorConfig::from(&config.orchestrator),
            metrics.clone(),
        ));

        Ok(Self {
            config,
            database,
            tier_manager,
            executor,
            metrics,
        })
    }

    /// 常驻模式：运行编排器直到收到关闭信号
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        if self.config.observability.metrics_enabled {
            let addr: SocketAddr = self
                .config
                .observability
                .metrics_bind_address
                .parse()
                .with_context(|| {
                    format!(
                        "无效的指标监听地址: {}",
                        self.config.observability.metrics_bind_address
                    )
                })?;
            install_prometheus_exporter(addr)?;
            info!(%addr, "Prometheus指标已导出");
        }

        let mut orchestrator = CollectionOrchestrator::new(
            self.tier_manager.clone(),
            self.executor.clone(),
            OrchestratorTiming::from(&self.config.orchestrator),
            self.metrics.clone(),
        );
        orchestrator.run(shutdown_rx).await;

        self.database.close().await;
        info!("数据库连接已关闭");
        Ok(())
    }

    /// 手动触发一个层级的采集，返回批次摘要
    pub async fn trigger(
        &self,
        tier: TierId,
        timeframe: Option<Timeframe>,
    ) -> Result<Vec<BatchSummary>> {
        let batches = self
            .executor
            .execute_immediately(tier, timeframe)
            .await
            .with_context(|| format!("手动触发层级 {tier} 失败"))?;

        Ok(batches.iter().map(|batch| batch.summary()).collect())
    }

    pub async fn close(&self) {
        self.database.close().await;
    }
}
