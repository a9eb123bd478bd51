//! 轮询式服务监听

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, info};

use super::enumerate::services;
use super::trait_def::Watcher;
use crate::context::Context;
use crate::discovery::ServiceInstance;
use crate::error::Result;
use crate::store::KvStore;

/// 按固定周期轮询某个服务前缀的监听器
///
/// 每次 `next` 返回该前缀下的全部存活实例，不做增量比较。
pub struct ServiceWatcher {
    prefix: String,
    ticker: Mutex<Interval>,
    ctx: Context,
    store: Arc<dyn KvStore>,
    scan_count: usize,
    stopped: AtomicBool,
}

impl ServiceWatcher {
    pub(crate) fn new(
        ctx: &Context,
        prefix: String,
        store: Arc<dyn KvStore>,
        period: Duration,
        scan_count: usize,
    ) -> Self {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(prefix = %prefix, period = ?period, "Watching services");

        Self {
            prefix,
            ticker: Mutex::new(ticker),
            ctx: ctx.with_cancel(),
            store,
            scan_count,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[async_trait]
impl Watcher for ServiceWatcher {
    async fn next(&self) -> Result<Vec<ServiceInstance>> {
        {
            let mut ticker = self.ticker.lock().await;
            tokio::select! {
                biased;
                cause = self.ctx.done() => return Err(cause.into()),
                _ = ticker.tick() => {}
            }
        }

        let items = services(&self.ctx, self.store.as_ref(), &self.prefix, self.scan_count).await?;
        debug!(prefix = %self.prefix, count = items.len(), "Polled service snapshot");
        Ok(items)
    }

    fn stop(&self) -> Result<()> {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            self.ctx.cancel();
            info!(prefix = %self.prefix, "Watcher stopped");
        }
        Ok(())
    }
}

impl Drop for ServiceWatcher {
    fn drop(&mut self) {
        self.ctx.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ContextError, RegistryError};
    use crate::store::MemoryStore;

    fn watcher(ctx: &Context, store: Arc<MemoryStore>) -> ServiceWatcher {
        ServiceWatcher::new(
            ctx,
            "/ms/orders".into(),
            store,
            Duration::from_secs(10),
            20,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn next_waits_for_tick() {
        let store = Arc::new(MemoryStore::new());
        let instance = ServiceInstance::new("orders", "i1");
        store.insert_raw("/ms/orders/i1", serde_json::to_string(&instance).unwrap());

        let w = watcher(&Context::background(), store.clone());
        let started = Instant::now();
        let items = w.next().await.unwrap();

        assert_eq!(items, vec![instance]);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_wakes_pending_next() {
        let store = Arc::new(MemoryStore::new());
        let w = Arc::new(watcher(&Context::background(), store.clone()));

        let pending = tokio::spawn({
            let w = w.clone();
            async move { w.next().await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        w.stop().unwrap();
        w.stop().unwrap();

        let res = pending.await.unwrap();
        assert!(matches!(res, Err(RegistryError::Context(ContextError::Canceled))));
        assert!(store.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn parent_deadline_ends_watch() {
        let store = Arc::new(MemoryStore::new());
        let ctx = Context::background().with_timeout(Duration::from_secs(3));
        let w = watcher(&ctx, store);

        let res = w.next().await;
        assert!(matches!(
            res,
            Err(RegistryError::Context(ContextError::DeadlineExceeded))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn store_error_surfaces_from_next() {
        let store = Arc::new(MemoryStore::new());
        let w = watcher(&Context::background(), store.clone());
        store.fail_with("timeout");

        assert!(w.next().await.unwrap_err().is_store());

        store.clear_failure();
        assert!(w.next().await.unwrap().is_empty());
    }
}
