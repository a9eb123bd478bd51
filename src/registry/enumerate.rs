//! 按前缀枚举服务实例
//!
//! GetService 与 Watcher 共用。SCAN 与 MGET 之间键可能过期，
//! 此时 MGET 返回空值，该键被静默跳过；但存在且无法解码的值
//! 会让整个调用失败。任何存储错误都立即中止，不返回部分结果。

use tracing::{debug, warn};

use crate::context::Context;
use crate::discovery::ServiceInstance;
use crate::error::Result;
use crate::store::{KvStore, SCAN_START, escape_glob};

pub(crate) async fn services(
    ctx: &Context,
    store: &dyn KvStore,
    prefix: &str,
    count: usize,
) -> Result<Vec<ServiceInstance>> {
    let pattern = format!("{}*", escape_glob(prefix));
    let mut cursor = SCAN_START;
    let mut items = Vec::new();

    loop {
        let (keys, next) = ctx.run(store.scan(cursor, &pattern, count)).await?;
        cursor = next;

        if keys.is_empty() {
            if cursor == SCAN_START {
                break;
            }
            // SCAN 允许中途返回空批次
            continue;
        }

        debug!(prefix = %prefix, batch = keys.len(), cursor, "Scanned registry keys");

        let values = ctx.run(store.mget(&keys)).await?;
        for (key, value) in keys.iter().zip(values) {
            match value {
                Some(raw) => items.push(serde_json::from_str::<ServiceInstance>(&raw)?),
                None => warn!(key = %key, "Registry key expired between scan and fetch"),
            }
        }

        if cursor == SCAN_START {
            break;
        }
    }

    Ok(items)
}
