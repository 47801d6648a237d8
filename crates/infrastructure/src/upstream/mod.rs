//! 上游 HTTP 服务客户端
//!
//! 所有 HTTP 失败都在这里映射为 [`CollectorError`] 的具体类别，
//! 重试策略只依赖这个分类做决定。

pub mod feature_pipeline;
pub mod http_collector;

pub use feature_pipeline::HttpFeaturePipeline;
pub use http_collector::HttpDataCollector;

use std::time::Duration;

use collector_core::CollectorError;

/// 按 HTTP 状态码分类上游错误
pub fn classify_status(status: u16, retry_after: Option<Duration>, body: &str) -> CollectorError {
    let detail = if body.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status} - {body}")
    };

    match status {
        429 => CollectorError::rate_limited(detail, retry_after),
        408 | 504 => CollectorError::Timeout(detail),
        500..=599 => CollectorError::Network(detail),
        400 | 404 | 422 => CollectorError::InvalidAsset(detail),
        _ => CollectorError::Upstream(detail),
    }
}

/// 按传输层失败类型分类
pub fn classify_transport(error: &reqwest::Error) -> CollectorError {
    if error.is_timeout() {
        CollectorError::Timeout(error.to_string())
    } else if error.is_connect() {
        CollectorError::Connection(error.to_string())
    } else {
        CollectorError::Network(error.to_string())
    }
}

/// 解析以秒表示的 `Retry-After` 头
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn retry_after_header(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_retry_after)
}

/// 非 2xx 响应转换为已分类的错误
pub(crate) async fn error_from_response(response: reqwest::Response) -> CollectorError {
    let status = response.status().as_u16();
    let retry_after = retry_after_header(&response);
    let body = response.text().await.unwrap_or_default();
    classify_status(status, retry_after, body.trim())
}
