//! 键值存储能力接口
//!
//! 注册中心只依赖这里定义的少量命令，生产环境使用 Redis，
//! 测试和本地运行可以使用进程内的 `MemoryStore`。

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod redis;

pub use memory::{COMMAND_LOG_CAPACITY, MemoryStore};
pub use self::redis::RedisStore;

/// SCAN 游标的起始值，也是一轮遍历结束的标志
pub const SCAN_START: u64 = 0;

/// 存储层错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// 键的剩余存活时间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// 键不存在
    Missing,
    /// 键存在但没有过期时间
    Persistent,
    /// 键将在给定时长后过期
    Expires(Duration),
}

impl KeyTtl {
    /// 从 Redis `PTTL` 的返回值转换（-2 不存在，-1 无过期时间）
    pub fn from_millis(pttl: i64) -> Self {
        match pttl {
            -2 => KeyTtl::Missing,
            n if n < 0 => KeyTtl::Persistent,
            n => KeyTtl::Expires(Duration::from_millis(n as u64)),
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        match self {
            KeyTtl::Expires(d) => Some(*d),
            _ => None,
        }
    }
}

/// 注册中心使用的存储命令集合
#[async_trait]
pub trait KvStore: Send + Sync {
    /// 写入值并设置过期时间
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// 批量读取，不存在的键对应 `None`
    async fn mget(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>>;

    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl>;

    /// 只刷新过期时间，不改写值。键不存在时返回 `false`
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    async fn del(&self, key: &str) -> StoreResult<()>;

    /// 游标遍历匹配 `pattern` 的键，返回本批键和下一个游标
    async fn scan(&self, cursor: u64, pattern: &str, count: usize)
    -> StoreResult<(Vec<String>, u64)>;

    async fn ping(&self) -> StoreResult<()>;
}

/// 转义 glob 元字符，使前缀按字面匹配
pub fn escape_glob(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
