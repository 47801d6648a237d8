//! 配置管理
//!
//! 配置在启动时加载一次：TOML 文件为基础，`COLLECTOR_` 前缀的环境变量覆盖，
//! 然后逐节校验。任何一节校验失败都会阻止进程启动。
//!
//! ```toml
//! [database]
//! url = "postgresql://localhost/market"
//!
//! [orchestrator]
//! max_in_flight_jobs = 20
//! sub_batch_size = 5
//! ```

mod models;

pub use models::*;
