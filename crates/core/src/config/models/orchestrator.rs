use serde::{Deserialize, Serialize};

/// 编排循环配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// 主循环节拍（毫秒）
    pub tick_interval_ms: u64,
    /// 调度列表刷新周期（秒）
    pub refresh_interval_seconds: u64,
    /// 全局同时执行的任务上限
    pub max_in_flight_jobs: usize,
    /// 每个子批次的任务数
    pub sub_batch_size: usize,
    /// 子批次之间的固定间隔（毫秒）
    pub sub_batch_delay_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            refresh_interval_seconds: 300,
            max_in_flight_jobs: 20,
            sub_batch_size: 5,
            sub_batch_delay_ms: 1000,
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(anyhow::anyhow!("主循环节拍必须大于0"));
        }
        if self.refresh_interval_seconds == 0 {
            return Err(anyhow::anyhow!("调度刷新周期必须大于0"));
        }
        if self.max_in_flight_jobs == 0 {
            return Err(anyhow::anyhow!("最大并发任务数必须大于0"));
        }
        if self.sub_batch_size == 0 {
            return Err(anyhow::anyhow!("子批次大小必须大于0"));
        }
        if self.sub_batch_size > self.max_in_flight_jobs {
            return Err(anyhow::anyhow!(
                "子批次大小({})不能超过最大并发任务数({})",
                self.sub_batch_size,
                self.max_in_flight_jobs
            ));
        }
        Ok(())
    }
}
