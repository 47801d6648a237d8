use std::time::Duration;

use async_trait::async_trait;
use collector_core::{
    config::UpstreamConfig, CollectorError, CollectorResult, DataCollector, Timeframe,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{classify_transport, error_from_response};

#[derive(Debug, Serialize)]
struct CollectRequest<'a> {
    asset_id: &'a str,
    timeframe: Timeframe,
    lookback_days: u32,
}

#[derive(Debug, Deserialize)]
struct CollectResponse {
    success: bool,
}

/// 通过 HTTP 调用上游采集服务：`POST {base_url}/collect`
pub struct HttpDataCollector {
    http_client: reqwest::Client,
    collect_url: String,
}

impl HttpDataCollector {
    pub fn new(config: &UpstreamConfig) -> CollectorResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| CollectorError::Configuration(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            http_client,
            collect_url: format!("{}/collect", config.base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl DataCollector for HttpDataCollector {
    #[instrument(skip(self), fields(url = %self.collect_url))]
    async fn collect(
        &self,
        asset_id: &str,
        timeframe: Timeframe,
        lookback_days: u32,
    ) -> CollectorResult<bool> {
        let request = CollectRequest {
            asset_id,
            timeframe,
            lookback_days,
        };

        let response = self
            .http_client
            .post(&self.collect_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body = response.bytes().await.map_err(|e| classify_transport(&e))?;
        let parsed: CollectResponse = serde_json::from_slice(&body)
            .map_err(|e| CollectorError::SchemaMismatch(format!("无法解析采集响应: {e}")))?;

        debug!(success = parsed.success, "采集请求完成");
        Ok(parsed.success)
    }
}
