//! 注册中心错误类型
//!
//! 错误分类：
//! - `Serialization`: 编解码失败，调用无任何副作用
//! - `Store`: 存储层传输或命令错误，原样向上传递
//! - `Context`: 取消或超时

use thiserror::Error;

use crate::store::StoreError;

/// 上下文结束原因
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// 注册中心统一错误类型
#[derive(Error, Debug)]
pub enum RegistryError {
    /// 服务实例缺少必填字段
    #[error("invalid service instance: {0}")]
    InvalidInstance(String),

    /// 配置非法（例如 TTL 为 0）
    #[error("invalid registry config: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Context(#[from] ContextError),
}

impl RegistryError {
    /// 是否为取消/超时引起的错误
    pub fn is_context(&self) -> bool {
        matches!(self, RegistryError::Context(_))
    }

    /// 是否为存储层错误
    pub fn is_store(&self) -> bool {
        matches!(self, RegistryError::Store(_))
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_errors_are_transparent() {
        let err = RegistryError::from(ContextError::DeadlineExceeded);
        assert!(err.is_context());
        assert_eq!(err.to_string(), "context deadline exceeded");
    }

    #[test]
    fn store_errors_keep_their_message() {
        let err = RegistryError::from(StoreError::Unavailable("connection refused".into()));
        assert!(err.is_store());
        assert!(err.to_string().contains("connection refused"));
    }
}
