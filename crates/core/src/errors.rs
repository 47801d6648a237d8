use std::time::Duration;

use thiserror::Error;

/// 采集系统错误类型定义
///
/// 变体按处理方式分组：
/// - 瞬时错误（可退避重试）：`Connection`、`Query`、`Network`、`Timeout`、`RateLimit`、`CollectionRejected`
/// - 永久错误（立即失败）：`InvalidAsset`、`SchemaMismatch`
/// - 配置错误（仅在启动时致命）：`Configuration`、`TierNotFound`
/// - 熔断：`CircuitOpen`
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("连接错误: {0}")]
    Connection(String),

    #[error("查询错误: {0}")]
    Query(String),

    #[error("网络错误: {0}")]
    Network(String),

    #[error("操作超时: {0}")]
    Timeout(String),

    #[error("触发上游限流: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("采集未成功: {asset_id} {timeframe}")]
    CollectionRejected { asset_id: String, timeframe: String },

    #[error("无效的资产标识: {0}")]
    InvalidAsset(String),

    #[error("数据结构不匹配: {0}")]
    SchemaMismatch(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("层级未找到: {tier}")]
    TierNotFound { tier: u8 },

    #[error("熔断器已打开，调用被拒绝: {0}")]
    CircuitOpen(String),

    #[error("上游错误: {0}")]
    Upstream(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 无分类错误消息中出现这些片段时视为瞬时错误
const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "connection reset",
    "connection refused",
    "broken pipe",
    "temporarily unavailable",
    "too many requests",
    "rate limit",
    "429",
    "502",
    "503",
    "504",
    "deadlock",
    "serialization failure",
    "try again",
];

impl CollectorError {
    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    /// 是否值得退避重试
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_)
            | Self::Query(_)
            | Self::Network(_)
            | Self::Timeout(_)
            | Self::RateLimit { .. }
            | Self::CollectionRejected { .. } => true,
            Self::InvalidAsset(_)
            | Self::SchemaMismatch(_)
            | Self::Configuration(_)
            | Self::TierNotFound { .. }
            | Self::CircuitOpen(_) => false,
            Self::Database(e) => is_transient_sqlx_error(e),
            Self::Upstream(msg) | Self::Internal(msg) => looks_transient(msg),
        }
    }

    /// 限流错误携带的等待提示
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen(_))
    }

    /// 用于指标标签和日志字段的简短类别名
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Database(_) => "database",
            Self::Connection(_) => "connection",
            Self::Query(_) => "query",
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::RateLimit { .. } => "rate_limit",
            Self::CollectionRejected { .. } => "collection_rejected",
            Self::InvalidAsset(_) => "invalid_asset",
            Self::SchemaMismatch(_) => "schema_mismatch",
            Self::Configuration(_) => "configuration",
            Self::TierNotFound { .. } => "tier_not_found",
            Self::CircuitOpen(_) => "circuit_open",
            Self::Upstream(_) => "upstream",
            Self::Internal(_) => "internal",
        }
    }
}

fn looks_transient(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn is_transient_sqlx_error(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        // 40001 serialization_failure, 40P01 deadlock_detected, 57P01 admin_shutdown
        sqlx::Error::Database(db) => matches!(
            db.code().as_deref(),
            Some("40001") | Some("40P01") | Some("57P01")
        ) || looks_transient(db.message()),
        _ => false,
    }
}

/// 统一的Result类型
pub type CollectorResult<T> = std::result::Result<T, CollectorError>;
