//! 类型化设置绑定
//!
//! 按添加顺序叠加配置文件，环境变量最后叠加并覆盖文件中的值。
//! 环境变量使用 `<前缀>_<节>__<键>` 的形式，例如 `KERNEL_CONTAINER__DEVELOPING=true`。

use config::{Config, Environment, File};
use infrastructure_common::ConfigError;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use tracing::{debug, error};

/// 类型化设置绑定器
#[derive(Debug, Clone, Default)]
pub struct SettingsBinder {
    files: Vec<(PathBuf, bool)>,
    env_prefix: Option<String>,
    overrides: Vec<(String, String)>,
}

impl SettingsBinder {
    /// 创建绑定器
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加必须存在的设置文件
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push((path.into(), true));
        self
    }

    /// 添加可选的设置文件
    pub fn with_optional_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push((path.into(), false));
        self
    }

    /// 启用环境变量覆盖
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// 显式覆盖某个键，优先级最高
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }

    fn build(&self) -> Result<Config, ConfigError> {
        let mut builder = Config::builder();
        for (path, required) in &self.files {
            builder = builder.add_source(File::from(path.clone()).required(*required));
        }
        if let Some(prefix) = &self.env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }
        for (key, value) in &self.overrides {
            builder = builder
                .set_override(key.as_str(), value.as_str())
                .map_err(ConfigError::parse_error)?;
        }
        builder.build().map_err(|e| {
            error!("设置构建失败: {}", e);
            ConfigError::parse_error(e)
        })
    }

    /// 绑定某个节，节不存在时返回错误
    pub fn bind<T: DeserializeOwned>(&self, section: &str) -> Result<T, ConfigError> {
        let settings = self.build()?;
        match settings.get::<T>(section) {
            Ok(value) => {
                debug!("设置已绑定: {} -> {}", section, std::any::type_name::<T>());
                Ok(value)
            }
            Err(config::ConfigError::NotFound(_)) => Err(ConfigError::KeyNotFound {
                key: section.to_string(),
            }),
            Err(e) => {
                error!("设置绑定失败: {}, 原因: {}", section, e);
                Err(ConfigError::parse_error(e))
            }
        }
    }

    /// 绑定某个节，节不存在时使用默认值
    pub fn bind_or_default<T: DeserializeOwned + Default>(
        &self,
        section: &str,
    ) -> Result<T, ConfigError> {
        match self.bind(section) {
            Err(ConfigError::KeyNotFound { .. }) => {
                debug!("设置节不存在, 使用默认值: {}", section);
                Ok(T::default())
            }
            other => other,
        }
    }
}
