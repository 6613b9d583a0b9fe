//! 组件初始化参数

use crate::errors::ConfigError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 组件初始化参数
///
/// 构造器参数中出现此类型时，容器注入该组件声明的参数，而不是按类型解析依赖。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InitParams {
    values: BTreeMap<String, serde_json::Value>,
}

impl InitParams {
    /// 创建空参数
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置参数
    pub fn with(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// 插入参数
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// 获取原始参数值
    pub fn raw(&self, name: &str) -> Option<&serde_json::Value> {
        self.values.get(name)
    }

    /// 获取字符串参数
    pub fn value_param(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(serde_json::Value::as_str)
    }

    /// 获取参数并转换为指定类型
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ConfigError> {
        match self.values.get(name) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| ConfigError::TypeConversionError {
                    message: format!("参数 {} 转换失败: {}", name, e),
                }),
            None => Ok(None),
        }
    }

    /// 获取必需参数
    pub fn require<T: DeserializeOwned>(&self, name: &str) -> Result<T, ConfigError> {
        self.get(name)?.ok_or_else(|| ConfigError::KeyNotFound {
            key: name.to_string(),
        })
    }

    /// 将全部参数绑定到具体类型
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        let value = serde_json::Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );

        serde_json::from_value(value).map_err(|e| ConfigError::SerializationError { source: e })
    }

    /// 参数名称
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 合并参数，`other` 中的同名参数覆盖当前值
    pub fn merge(&mut self, other: &InitParams) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
    }
}
