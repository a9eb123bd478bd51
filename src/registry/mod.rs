//! 基于键值存储的服务注册发现
//!
//! 注册记录键为 `{namespace}/{service}/{instance}`，值为实例 JSON，
//! 带 TTL。注册后由后台心跳周期性续期，停止续期后记录自然过期。

mod enumerate;
mod heartbeat;
pub mod trait_def;
pub mod watcher;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::RegistryOptions;
use crate::context::Context;
use crate::discovery::ServiceInstance;
use crate::error::Result;
use crate::store::{KvStore, RedisStore};

use enumerate::services;
use heartbeat::{Heartbeat, renew_or_write};

pub use heartbeat::Renewal;
pub use trait_def::{Discovery, Registrar, Watcher};
pub use watcher::ServiceWatcher;

/// 服务注册中心
///
/// 每个注册实例拥有独立的心跳任务；注销某个实例只影响它自己。
pub struct Registry {
    store: Arc<dyn KvStore>,
    options: RegistryOptions,
    root: Context,
    heartbeats: Mutex<HashMap<String, Heartbeat>>,
}

impl Registry {
    pub fn new(store: Arc<dyn KvStore>, options: RegistryOptions) -> Result<Self> {
        options.validate()?;
        let root = options.context.with_cancel();
        Ok(Self {
            store,
            options,
            root,
            heartbeats: Mutex::new(HashMap::new()),
        })
    }

    /// 连接 Redis 并创建注册中心
    pub async fn connect(redis_url: &str, options: RegistryOptions) -> Result<Self> {
        let store = RedisStore::connect(redis_url).await?;
        Self::new(Arc::new(store), options)
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    fn instance_key(&self, name: &str, id: &str) -> String {
        format!("{}/{}/{}", self.options.namespace, name, id)
    }

    fn service_prefix(&self, name: &str) -> String {
        format!("{}/{}", self.options.namespace, name)
    }

    /// 当前仍在续期的注册键
    pub async fn active_registrations(&self) -> Vec<String> {
        let heartbeats = self.heartbeats.lock().await;
        let mut keys: Vec<String> = heartbeats
            .iter()
            .filter(|(_, heartbeat)| heartbeat.is_running())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// 对指定实例立即执行一次续期规则
    pub async fn renew(&self, ctx: &Context, instance: &ServiceInstance) -> Result<Renewal> {
        instance.validate()?;
        let key = self.instance_key(&instance.name, &instance.id);
        let value = serde_json::to_string(instance)?;
        renew_or_write(ctx, self.store.as_ref(), &key, &value, self.options.record_ttl()).await
    }

    /// 命名空间下所有服务名
    pub async fn list_services(&self, ctx: &Context) -> Result<Vec<String>> {
        let instances = services(
            ctx,
            self.store.as_ref(),
            &format!("{}/", self.options.namespace),
            self.options.scan_count,
        )
        .await?;
        let names: BTreeSet<String> = instances.into_iter().map(|i| i.name).collect();
        Ok(names.into_iter().collect())
    }

    pub async fn health_check(&self, ctx: &Context) -> Result<()> {
        ctx.run(self.store.ping()).await
    }

    /// 停止全部心跳，不删除注册记录（记录随 TTL 自然过期）
    pub async fn shutdown(&self) {
        self.root.cancel();
        let drained: Vec<(String, Heartbeat)> = self.heartbeats.lock().await.drain().collect();
        for (key, heartbeat) in drained {
            heartbeat.stop().await;
            info!(key = %key, "Registration released on shutdown");
        }
    }
}

#[async_trait]
impl Registrar for Registry {
    async fn register(&self, ctx: &Context, instance: &ServiceInstance) -> Result<()> {
        instance.validate()?;
        let key = self.instance_key(&instance.name, &instance.id);
        let value = serde_json::to_string(instance)?;
        let ttl = self.options.record_ttl();

        // shutdown 或根上下文结束后拒绝注册
        if let Some(cause) = self.root.err() {
            return Err(cause.into());
        }
        renew_or_write(ctx, self.store.as_ref(), &key, &value, ttl).await?;

        let mut heartbeats = self.heartbeats.lock().await;
        // shutdown 先取消根上下文再清空句柄表，持锁复查
        if let Some(cause) = self.root.err() {
            return Err(cause.into());
        }
        let heartbeat = Heartbeat::spawn(
            self.root.with_cancel(),
            self.store.clone(),
            key.clone(),
            value,
            self.options.ttl,
            ttl,
        );
        let replaced = heartbeats.insert(key.clone(), heartbeat);
        drop(heartbeats);
        if let Some(previous) = replaced {
            warn!(key = %key, "Instance registered again, replacing previous heartbeat");
            previous.stop().await;
        }

        info!(
            service = %instance.name,
            instance_id = %instance.id,
            key = %key,
            "✅ Service registered"
        );
        Ok(())
    }

    async fn deregister(&self, ctx: &Context, instance: &ServiceInstance) -> Result<()> {
        let key = self.instance_key(&instance.name, &instance.id);

        let heartbeat = self.heartbeats.lock().await.remove(&key);
        if let Some(heartbeat) = heartbeat {
            heartbeat.stop().await;
        }

        ctx.run(self.store.del(&key)).await?;
        info!(
            service = %instance.name,
            instance_id = %instance.id,
            "Service deregistered"
        );
        Ok(())
    }
}

#[async_trait]
impl Discovery for Registry {
    async fn get_service(&self, ctx: &Context, name: &str) -> Result<Vec<ServiceInstance>> {
        services(
            ctx,
            self.store.as_ref(),
            &self.service_prefix(name),
            self.options.scan_count,
        )
        .await
    }

    async fn watch(&self, ctx: &Context, name: &str) -> Result<Box<dyn Watcher>> {
        Ok(Box::new(ServiceWatcher::new(
            ctx,
            self.service_prefix(name),
            self.store.clone(),
            self.options.watcher_ttl,
            self.options.scan_count,
        )))
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
