//! 日志初始化

use tracing_subscriber::{EnvFilter, fmt};

/// 安装全局 fmt subscriber，`RUST_LOG` 优先于 `default_level`。
///
/// 重复调用时保留已有的 subscriber。
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}

/// JSON 格式输出，适合日志采集
pub fn init_json_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = fmt().json().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_tracing("debug");
        init_tracing("info");
        init_json_tracing("info");
        tracing::info!("tracing initialised twice without panicking");
    }
}
