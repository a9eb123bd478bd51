//! 服务实例定义

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};

/// 服务实例
///
/// 存储中以 JSON 保存，字段名与其它语言的注册中心客户端保持一致。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ServiceInstance {
    /// 实例 ID，在同一服务名下唯一
    pub id: String,

    /// 服务名称
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// 访问端点，如 `grpc://127.0.0.1:9000`
    #[serde(default)]
    pub endpoints: Vec<String>,
}

impl ServiceInstance {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// 使用随机 UUID 作为实例 ID
    pub fn with_random_id(name: impl Into<String>) -> Self {
        Self::new(name, uuid::Uuid::new_v4().to_string())
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoints.push(endpoint.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// 注册前的必填字段检查
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(RegistryError::InvalidInstance(
                "service name is empty".into(),
            ));
        }
        if self.id.is_empty() {
            return Err(RegistryError::InvalidInstance(format!(
                "instance id is empty for service {}",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape() {
        let instance = ServiceInstance::new("orders", "i1")
            .with_version("v1.2.0")
            .with_endpoint("grpc://10.0.0.1:9000")
            .with_metadata("zone", "a");

        let json = serde_json::to_value(&instance).unwrap();
        assert_eq!(json["id"], "i1");
        assert_eq!(json["name"], "orders");
        assert_eq!(json["version"], "v1.2.0");
        assert_eq!(json["endpoints"][0], "grpc://10.0.0.1:9000");
        assert_eq!(json["metadata"]["zone"], "a");
    }

    #[test]
    fn decodes_sparse_records() {
        let instance: ServiceInstance =
            serde_json::from_str(r#"{"id":"i9","name":"orders"}"#).unwrap();
        assert_eq!(instance, ServiceInstance::new("orders", "i9"));
    }

    #[test]
    fn validate_requires_name_and_id() {
        assert!(ServiceInstance::new("", "i1").validate().is_err());
        assert!(ServiceInstance::new("orders", "").validate().is_err());
        assert!(ServiceInstance::with_random_id("orders").validate().is_ok());
    }
}
