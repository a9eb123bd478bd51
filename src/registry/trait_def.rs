//! 服务注册发现 Trait 定义

use async_trait::async_trait;

use crate::context::Context;
use crate::discovery::ServiceInstance;
use crate::error::Result;

/// 服务注册
#[async_trait]
pub trait Registrar: Send + Sync {
    /// 注册实例并在后台持续续期
    async fn register(&self, ctx: &Context, instance: &ServiceInstance) -> Result<()>;

    /// 停止该实例的续期并删除注册记录
    async fn deregister(&self, ctx: &Context, instance: &ServiceInstance) -> Result<()>;
}

/// 服务发现
#[async_trait]
pub trait Discovery: Send + Sync {
    /// 获取服务当前全部存活实例
    async fn get_service(&self, ctx: &Context, name: &str) -> Result<Vec<ServiceInstance>>;

    /// 创建轮询式监听器
    async fn watch(&self, ctx: &Context, name: &str) -> Result<Box<dyn Watcher>>;
}

/// 服务监听器
#[async_trait]
pub trait Watcher: Send + Sync {
    /// 等待下一次轮询并返回全量快照；监听器停止或上下文结束时返回错误
    async fn next(&self) -> Result<Vec<ServiceInstance>>;

    /// 停止监听，可重复调用
    fn stop(&self) -> Result<()>;
}
