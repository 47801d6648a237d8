pub mod manager;
pub mod postgres;
pub mod sqlite;

pub use manager::{DatabaseManager, DatabasePool, DatabaseType};
pub use postgres::PostgresTierStore;
pub use sqlite::SqliteTierStore;

use collector_core::{CollectorError, CollectorResult, TierId};

/// 层级编号列超出范围说明表结构与预期不符
pub(crate) fn tier_from_column(asset_id: &str, value: i64) -> CollectorResult<TierId> {
    TierId::try_from(value).map_err(|_| {
        CollectorError::SchemaMismatch(format!("资产 {asset_id} 的层级编号无效: {value}"))
    })
}

pub(crate) fn counter_from_column(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
