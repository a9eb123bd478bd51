//! 进程内存储实现
//!
//! 行为与 Redis 对齐：键带过期时间、SCAN 按游标分批遍历、
//! MGET 对不存在的键返回空值。时间基于 `tokio::time`，
//! 因此可以在暂停时钟的测试中精确推进。

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::Bound;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{KeyTtl, KvStore, SCAN_START, StoreError, StoreResult};

/// 命令日志最多保留的条数，超出后丢弃最早的记录
pub const COMMAND_LOG_CAPACITY: usize = 1024;

/// 未完成的 SCAN 游标最多保留的数量
const MAX_OPEN_CURSORS: usize = 1024;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Debug)]
struct Failure {
    /// 在开始失败之前还能成功执行的命令数
    after: usize,
    reason: String,
}

#[derive(Default)]
struct Inner {
    entries: BTreeMap<String, Entry>,
    failure: Option<Failure>,
    commands: VecDeque<String>,
    /// 游标 -> 上一批最后检查到的键，下一批从其后继续
    cursors: HashMap<u64, String>,
    next_cursor: u64,
}

impl Inner {
    fn begin(&mut self, command: &str) -> StoreResult<Instant> {
        if self.commands.len() == COMMAND_LOG_CAPACITY {
            self.commands.pop_front();
        }
        self.commands.push_back(command.to_string());
        if let Some(failure) = &mut self.failure {
            if failure.after == 0 {
                return Err(StoreError::Unavailable(failure.reason.clone()));
            }
            failure.after -= 1;
        }
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_live(now));
        Ok(now)
    }

    /// 记录续扫位置并分配新游标（从不分配 0）
    fn open_cursor(&mut self, last_key: String) -> u64 {
        if self.cursors.len() >= MAX_OPEN_CURSORS {
            // 被放弃的遍历不会再回来取游标
            self.cursors.clear();
        }
        self.next_cursor = self.next_cursor.wrapping_add(1).max(1);
        self.cursors.insert(self.next_cursor, last_key);
        self.next_cursor
    }
}

/// 进程内键值存储
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后的每条命令都以 `StoreError::Unavailable` 失败
    pub fn fail_with(&self, reason: impl Into<String>) {
        self.fail_after(0, reason);
    }

    /// 再成功执行 `commands` 条命令后开始失败
    pub fn fail_after(&self, commands: usize, reason: impl Into<String>) {
        self.lock().failure = Some(Failure {
            after: commands,
            reason: reason.into(),
        });
    }

    pub fn clear_failure(&self) {
        self.lock().failure = None;
    }

    /// 最近执行的命令名称（按顺序，最多 `COMMAND_LOG_CAPACITY` 条），不论成功与否
    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.iter().cloned().collect()
    }

    pub fn clear_commands(&self) {
        self.lock().commands.clear();
    }

    /// 直接读取当前值，不记录命令
    pub fn peek(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.lock()
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    /// 直接写入不过期的原始值，不记录命令
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock().entries.insert(
            key.into(),
            Entry {
                value: value.into(),
                expires_at: None,
            },
        );
    }

    /// 直接删除，不记录命令
    pub fn remove_raw(&self, key: &str) {
        self.lock().entries.remove(key);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // 锁内不会 panic，被毒化时沿用内部数据
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let mut inner = self.lock();
        let now = inner.begin("SET")?;
        inner.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(now + ttl),
            },
        );
        Ok(())
    }

    async fn mget(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>> {
        let mut inner = self.lock();
        inner.begin("MGET")?;
        Ok(keys
            .iter()
            .map(|key| inner.entries.get(key).map(|entry| entry.value.clone()))
            .collect())
    }

    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl> {
        let mut inner = self.lock();
        let now = inner.begin("TTL")?;
        Ok(match inner.entries.get(key) {
            None => KeyTtl::Missing,
            Some(Entry {
                expires_at: None, ..
            }) => KeyTtl::Persistent,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => KeyTtl::Expires(at.saturating_duration_since(now)),
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let mut inner = self.lock();
        let now = inner.begin("EXPIRE")?;
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn del(&self, key: &str) -> StoreResult<()> {
        let mut inner = self.lock();
        inner.begin("DEL")?;
        inner.entries.remove(key);
        Ok(())
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> StoreResult<(Vec<String>, u64)> {
        let mut inner = self.lock();
        inner.begin("SCAN")?;
        let count = count.max(1);

        // 游标对应上一批最后检查到的键，键的增删不会让遍历跳过存活的键
        let lower = if cursor == SCAN_START {
            Bound::Unbounded
        } else {
            match inner.cursors.remove(&cursor) {
                Some(last) => Bound::Excluded(last),
                None => return Ok((Vec::new(), SCAN_START)),
            }
        };

        let examined: Vec<String> = inner
            .entries
            .range::<String, _>((lower, Bound::Unbounded))
            .take(count + 1)
            .map(|(key, _)| key.clone())
            .collect();

        // 多取一个键用于判断是否还有后续批次
        let has_more = examined.len() > count;
        let batch = &examined[..examined.len().min(count)];
        let keys = batch
            .iter()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();

        let next = match batch.last() {
            Some(last) if has_more => inner.open_cursor(last.clone()),
            _ => SCAN_START,
        };
        Ok((keys, next))
    }

    async fn ping(&self) -> StoreResult<()> {
        self.lock().begin("PING")?;
        Ok(())
    }
}

/// Redis 风格的 glob 匹配，支持 `*`、`?` 与反斜杠转义
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    glob_match_from(&pattern, &text)
}

fn glob_match_from(pattern: &[char], text: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('*') => {
            let rest = &pattern[1..];
            (0..=text.len()).any(|skip| glob_match_from(rest, &text[skip..]))
        }
        Some('?') => !text.is_empty() && glob_match_from(&pattern[1..], &text[1..]),
        Some('\\') if pattern.len() > 1 => {
            text.first() == Some(&pattern[1]) && glob_match_from(&pattern[2..], &text[1..])
        }
        Some(ch) => text.first() == Some(ch) && glob_match_from(&pattern[1..], &text[1..]),
    }
}
