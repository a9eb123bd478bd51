//! 快照比较
//!
//! `Watcher::next` 每次返回全量实例列表，需要变更语义的调用方
//! 可以用这里的工具比较相邻两次快照。

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use super::ServiceInstance;

/// 两次快照之间的差异（均为实例 ID，已排序）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// ID 相同但内容（版本、端点、元数据）变化
    pub updated: Vec<String>,
}

impl SnapshotDiff {
    pub fn between(previous: &[ServiceInstance], current: &[ServiceInstance]) -> Self {
        let before: BTreeMap<&str, &ServiceInstance> =
            previous.iter().map(|i| (i.id.as_str(), i)).collect();
        let after: BTreeMap<&str, &ServiceInstance> =
            current.iter().map(|i| (i.id.as_str(), i)).collect();

        let mut diff = SnapshotDiff::default();
        for (id, instance) in &after {
            match before.get(id) {
                None => diff.added.push(id.to_string()),
                Some(old) if *old != *instance => diff.updated.push(id.to_string()),
                Some(_) => {}
            }
        }
        diff.removed = before
            .keys()
            .filter(|id| !after.contains_key(*id))
            .map(|id| id.to_string())
            .collect();
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

/// 与顺序无关的快照指纹
pub fn fingerprint(instances: &[ServiceInstance]) -> u64 {
    let canonical: BTreeSet<String> = instances
        .iter()
        .map(|instance| {
            let metadata: BTreeMap<_, _> = instance.metadata.iter().collect();
            format!(
                "{}|{}|{}|{:?}|{:?}",
                instance.name, instance.id, instance.version, instance.endpoints, metadata
            )
        })
        .collect();

    let mut hasher = DefaultHasher::new();
    canonical.hash(&mut hasher);
    hasher.finish()
}
