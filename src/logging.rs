//! 日志初始化

use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

/// 安装 fmt 日志订阅器
///
/// 优先使用 `RUST_LOG`，未设置时使用 `default_filter`（例如 `"flare_grpc_retry=debug"`）。
/// 重复初始化会返回错误。
pub fn init_logging(default_filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| anyhow!("invalid log filter {:?}: {}", default_filter, e))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow!(e))
}
