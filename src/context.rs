//! 调用上下文
//!
//! 可取消、可带截止时间的作用域。子上下文随父上下文一起结束，
//! 取消子上下文不会影响父上下文。

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{ContextError, RegistryError};
use crate::store::StoreError;

#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// 根上下文：永不取消，没有截止时间
    pub fn background() -> Self {
        Self::default()
    }

    /// 派生可独立取消的子上下文
    pub fn with_cancel(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// 派生带超时的子上下文
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// 派生带截止时间的子上下文，取继承截止时间与新截止时间中较早者
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(inherited) if inherited < deadline => inherited,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// 上下文结束原因，仍然存活时返回 `None`
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            return Some(ContextError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// 等待上下文结束（取消或超时），返回结束原因
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => ContextError::Canceled,
                    _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                ContextError::Canceled
            }
        }
    }

    /// 在上下文内执行一次存储调用，上下文结束时立即中止该调用
    pub async fn run<T, F>(&self, fut: F) -> Result<T, RegistryError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        if let Some(err) = self.err() {
            return Err(err.into());
        }
        tokio::select! {
            biased;
            cause = self.done() => Err(cause.into()),
            res = fut => res.map_err(RegistryError::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_propagates_to_children_only() {
        let parent = Context::background();
        let child = parent.with_cancel();
        let grandchild = child.with_cancel();

        child.cancel();
        assert_eq!(child.err(), Some(ContextError::Canceled));
        assert_eq!(grandchild.err(), Some(ContextError::Canceled));
        assert_eq!(parent.err(), None);

        // 重复取消无副作用
        child.cancel();
        assert_eq!(child.done().await, ContextError::Canceled);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let ctx = Context::background().with_timeout(Duration::from_secs(3));
        assert!(!ctx.is_done());

        assert_eq!(ctx.done().await, ContextError::DeadlineExceeded);
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn child_keeps_earlier_deadline() {
        let parent = Context::background().with_timeout(Duration::from_secs(1));
        let child = parent.with_timeout(Duration::from_secs(10));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn run_aborts_pending_call() {
        let ctx = Context::background().with_timeout(Duration::from_millis(50));
        let res: Result<(), RegistryError> = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;

        assert!(matches!(
            res,
            Err(RegistryError::Context(ContextError::DeadlineExceeded))
        ));
    }

    #[tokio::test]
    async fn run_refuses_when_already_canceled() {
        let ctx = Context::background().with_cancel();
        ctx.cancel();
        let res = ctx.run(async { Ok::<_, StoreError>(1) }).await;
        assert!(matches!(res, Err(RegistryError::Context(ContextError::Canceled))));
    }
}
