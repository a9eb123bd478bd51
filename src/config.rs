//! 注册中心配置
//!
//! `RegistryConfig` 为文件形式（TOML，时长以秒为单位），
//! `RegistryOptions` 为运行时形式，通过 builder 方法调整。

use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::{RegistryError, Result};

pub const DEFAULT_NAMESPACE: &str = "/microservices";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_SCAN_COUNT: usize = 20;
/// 每次写入的 TTL 都会额外追加的宽限时间
pub const DEFAULT_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// 注册记录 TTL（秒），同时也是续期间隔
    #[serde(default = "default_ttl_secs")]
    pub ttl: u64,
    /// 监听轮询间隔（秒）
    #[serde(default = "default_ttl_secs")]
    pub watcher_ttl: u64,
    #[serde(default = "default_scan_count")]
    pub scan_count: usize,
    #[serde(default = "default_grace_secs")]
    pub grace: u64,
}

fn default_redis_url() -> String {
    DEFAULT_REDIS_URL.to_string()
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}

fn default_scan_count() -> usize {
    DEFAULT_SCAN_COUNT
}

fn default_grace_secs() -> u64 {
    DEFAULT_GRACE.as_secs()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            namespace: default_namespace(),
            ttl: default_ttl_secs(),
            watcher_ttl: default_ttl_secs(),
            scan_count: default_scan_count(),
            grace: default_grace_secs(),
        }
    }
}

impl RegistryConfig {
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read registry config {path}"))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("failed to parse registry config {path}"))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: RegistryConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn into_options(self) -> RegistryOptions {
        RegistryOptions::default()
            .with_namespace(self.namespace)
            .with_ttl(Duration::from_secs(self.ttl))
            .with_watcher_ttl(Duration::from_secs(self.watcher_ttl))
            .with_scan_count(self.scan_count)
            .with_grace(Duration::from_secs(self.grace))
    }
}

/// 注册中心运行时选项
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// 根上下文，所有心跳任务都从它派生
    pub context: Context,
    pub namespace: String,
    pub ttl: Duration,
    pub watcher_ttl: Duration,
    pub scan_count: usize,
    pub grace: Duration,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            context: Context::background(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            ttl: DEFAULT_TTL,
            watcher_ttl: DEFAULT_TTL,
            scan_count: DEFAULT_SCAN_COUNT,
            grace: DEFAULT_GRACE,
        }
    }
}

impl RegistryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_watcher_ttl(mut self, ttl: Duration) -> Self {
        self.watcher_ttl = ttl;
        self
    }

    pub fn with_scan_count(mut self, count: usize) -> Self {
        self.scan_count = count;
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// 写入存储的 TTL：续期间隔 + 宽限时间
    pub fn record_ttl(&self) -> Duration {
        self.ttl + self.grace
    }

    pub fn validate(&self) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(RegistryError::InvalidConfig("ttl must be positive".into()));
        }
        if self.watcher_ttl.is_zero() {
            return Err(RegistryError::InvalidConfig(
                "watcher_ttl must be positive".into(),
            ));
        }
        if self.scan_count == 0 {
            return Err(RegistryError::InvalidConfig(
                "scan_count must be positive".into(),
            ));
        }
        Ok(())
    }
}
