//! 组件声明来源实现

use async_trait::async_trait;
use config::{Config, File, FileFormat};
use config_abstractions::{ConfigurationSource, ContainerConfiguration};
use infrastructure_common::ConfigError;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// 按扩展名推断文件格式
pub fn file_format(path: &Path) -> Result<FileFormat, ConfigError> {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match extension.as_str() {
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        _ => Err(ConfigError::UnsupportedFormat { extension }),
    }
}

/// 文件组件声明来源
#[derive(Debug, Clone)]
pub struct FileConfigurationSource {
    path: PathBuf,
    name: String,
    required: bool,
}

impl FileConfigurationSource {
    /// 创建文件来源，默认必须存在
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: path.display().to_string(),
            path,
            required: true,
        }
    }

    /// 设置文件是否必须存在
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// 文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 从文本解析组件声明
    pub fn parse(text: &str, format: FileFormat) -> Result<ContainerConfiguration, ConfigError> {
        Config::builder()
            .add_source(File::from_str(text, format))
            .build()
            .and_then(|settings| settings.try_deserialize::<ContainerConfiguration>())
            .map_err(ConfigError::parse_error)
    }
}

#[async_trait]
impl ConfigurationSource for FileConfigurationSource {
    async fn load(&self) -> Result<ContainerConfiguration, ConfigError> {
        let format = file_format(&self.path)?;

        if !tokio::fs::try_exists(&self.path).await? {
            if self.required {
                error!("组件声明文件不存在: {}", self.path.display());
                return Err(ConfigError::FileNotFound {
                    path: self.name.clone(),
                });
            }
            warn!("可选的组件声明文件不存在, 跳过: {}", self.path.display());
            return Ok(ContainerConfiguration::default());
        }

        let text = tokio::fs::read_to_string(&self.path).await?;
        let configuration = Self::parse(&text, format).map_err(|e| {
            error!("组件声明解析失败: {}, 原因: {}", self.path.display(), e);
            e
        })?;
        debug!(
            "组件声明文件已加载: {}, 组件 {} 个, 外部插件组 {} 个",
            self.path.display(),
            configuration.components.len(),
            configuration.external_plugins.len()
        );
        Ok(configuration)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_required(&self) -> bool {
        self.required
    }
}

/// 内存组件声明来源
#[derive(Debug, Clone, Default)]
pub struct InMemoryConfigurationSource {
    name: String,
    configuration: ContainerConfiguration,
}

impl InMemoryConfigurationSource {
    /// 创建内存来源
    pub fn new(name: impl Into<String>, configuration: ContainerConfiguration) -> Self {
        Self {
            name: name.into(),
            configuration,
        }
    }
}

#[async_trait]
impl ConfigurationSource for InMemoryConfigurationSource {
    async fn load(&self) -> Result<ContainerConfiguration, ConfigError> {
        Ok(self.configuration.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
