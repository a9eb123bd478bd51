//! 服务实例实体与快照工具

pub mod instance;
pub mod snapshot;

pub use instance::ServiceInstance;
pub use snapshot::{SnapshotDiff, fingerprint};
