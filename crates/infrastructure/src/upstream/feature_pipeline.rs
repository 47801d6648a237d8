use std::time::Duration;

use async_trait::async_trait;
use collector_core::{
    CollectorError, CollectorResult, FeaturePipeline, TierId, Timeframe,
};
use serde::Serialize;
use tracing::{debug, instrument};

use super::{classify_transport, error_from_response};

#[derive(Debug, Serialize)]
struct TriggerRequest<'a> {
    tier: TierId,
    timeframe: Timeframe,
    asset_ids: &'a [String],
}

/// 通过 HTTP 通知下游特征计算服务
pub struct HttpFeaturePipeline {
    http_client: reqwest::Client,
    url: String,
}

impl HttpFeaturePipeline {
    pub fn new(url: impl Into<String>, timeout: Duration) -> CollectorResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollectorError::Configuration(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl FeaturePipeline for HttpFeaturePipeline {
    #[instrument(skip(self, asset_ids), fields(url = %self.url, assets = asset_ids.len()))]
    async fn trigger(
        &self,
        tier: TierId,
        timeframe: Timeframe,
        asset_ids: &[String],
    ) -> CollectorResult<()> {
        let request = TriggerRequest {
            tier,
            timeframe,
            asset_ids,
        };

        let response = self
            .http_client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        debug!("特征计算已触发");
        Ok(())
    }
}
