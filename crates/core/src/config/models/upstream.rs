use serde::{Deserialize, Serialize};

/// 上游采集服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub request_timeout_seconds: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

impl UpstreamConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "上游地址必须以http://或https://开头: {}",
                self.base_url
            ));
        }
        if self.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("请求超时时间必须大于0"));
        }
        Ok(())
    }
}

/// 下游特征计算配置，未配置 `url` 时不触发
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl FeatureConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        match &self.url {
            Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => Err(
                anyhow::anyhow!("特征服务地址必须以http://或https://开头: {}", url),
            ),
            _ => Ok(()),
        }
    }
}
