//! Flare Redis Registry
//!
//! 以 Redis 作为存活实例的事实来源，实现服务注册（带 TTL 心跳续期）、
//! 服务发现（前缀 SCAN + MGET）与轮询式监听。

pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod registry;
pub mod store;
pub mod telemetry;

// Re-exports
pub use config::{RegistryConfig, RegistryOptions};
pub use context::Context;
pub use discovery::{ServiceInstance, SnapshotDiff, fingerprint};
pub use error::{ContextError, RegistryError, Result};
pub use registry::{Discovery, Registrar, Registry, Renewal, ServiceWatcher, Watcher};
pub use store::{KeyTtl, KvStore, MemoryStore, RedisStore, StoreError};
