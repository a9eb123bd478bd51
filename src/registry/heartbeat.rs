//! 注册记录续期
//!
//! 每个注册实例拥有独立的心跳任务，由注册中心持有句柄，
//! 注销时只停止并等待自己的任务结束。

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::error::Result;
use crate::store::{KeyTtl, KvStore};

/// 剩余 TTL 超过该值时只刷新过期时间
const RENEW_THRESHOLD: Duration = Duration::from_secs(1);

/// 一次续期的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renewal {
    /// 记录仍存活，仅延长 TTL
    Extended,
    /// 记录不存在或即将过期，重新写入完整值
    Rewritten,
}

/// 续期或重写：剩余 TTL 充足时只 EXPIRE，避免重复写入值
pub(crate) async fn renew_or_write(
    ctx: &Context,
    store: &dyn KvStore,
    key: &str,
    value: &str,
    ttl: Duration,
) -> Result<Renewal> {
    let remaining = ctx.run(store.ttl(key)).await?;
    if let KeyTtl::Expires(left) = remaining {
        if left > RENEW_THRESHOLD && ctx.run(store.expire(key, ttl)).await? {
            return Ok(Renewal::Extended);
        }
    }
    ctx.run(store.set(key, value, ttl)).await?;
    Ok(Renewal::Rewritten)
}

/// 单个实例的心跳任务句柄
pub(crate) struct Heartbeat {
    ctx: Context,
    handle: JoinHandle<()>,
}

impl Heartbeat {
    /// 启动心跳：每隔 `period` 执行一次续期，首次在一个周期之后
    pub(crate) fn spawn(
        ctx: Context,
        store: Arc<dyn KvStore>,
        key: String,
        value: String,
        period: Duration,
        ttl: Duration,
    ) -> Self {
        let task_ctx = ctx.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = task_ctx.done() => break,
                    _ = ticker.tick() => {
                        match renew_or_write(&task_ctx, store.as_ref(), &key, &value, ttl).await {
                            Ok(renewal) => {
                                debug!(key = %key, ?renewal, "💓 Heartbeat sent");
                            }
                            Err(e) if e.is_context() => break,
                            // 不重试，等待下一个周期
                            Err(e) => {
                                warn!(key = %key, error = %e, "⚠️ Failed to send heartbeat");
                            }
                        }
                    }
                }
            }
            info!(key = %key, "🛑 Heartbeat task stopped");
        });

        Self { ctx, handle }
    }

    pub(crate) fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// 取消并等待任务退出
    pub(crate) async fn stop(self) {
        self.ctx.cancel();
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                warn!(error = %e, "Heartbeat task panicked");
            }
        }
    }
}
