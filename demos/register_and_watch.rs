//! 注册当前进程并监听同名服务
//!
//! ```bash
//! cargo run --example register_and_watch -- registry.toml
//! ```

use flare_redis_registry::telemetry::init_tracing;
use flare_redis_registry::{
    Context, Discovery, Registrar, Registry, RegistryConfig, ServiceInstance, SnapshotDiff,
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    let config = match std::env::args().nth(1) {
        Some(path) => RegistryConfig::load_from_file(&path)?,
        None => RegistryConfig::default(),
    };
    let redis_url = config.redis_url.clone();
    let registry = Registry::connect(&redis_url, config.into_options()).await?;

    let ctx = Context::background();
    let instance = ServiceInstance::with_random_id("demo")
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_endpoint("http://127.0.0.1:8080");
    registry.register(&ctx, &instance).await?;

    let watch_ctx = ctx.with_cancel();
    let watcher = registry.watch(&watch_ctx, "demo").await?;
    let mut previous = registry.get_service(&ctx, "demo").await?;
    info!(instances = previous.len(), "Initial snapshot");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received (Ctrl+C)");
                break;
            }
            snapshot = watcher.next() => {
                let current = snapshot?;
                let diff = SnapshotDiff::between(&previous, &current);
                if !diff.is_empty() {
                    info!(added = ?diff.added, removed = ?diff.removed, updated = ?diff.updated, "Service changed");
                }
                previous = current;
            }
        }
    }

    watcher.stop()?;
    registry.deregister(&ctx, &instance).await?;
    Ok(())
}
