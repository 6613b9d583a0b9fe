//! 配置来源抽象接口

use crate::declaration::ContainerConfiguration;
use async_trait::async_trait;
use infrastructure_common::ConfigError;

/// 配置来源 trait
///
/// 提供组件声明列表，多个来源按顺序合并。
#[async_trait]
pub trait ConfigurationSource: Send + Sync {
    /// 加载容器配置
    async fn load(&self) -> Result<ContainerConfiguration, ConfigError>;

    /// 获取来源名称
    fn name(&self) -> &str;

    /// 来源不存在时是否视为错误
    fn is_required(&self) -> bool {
        true
    }
}

/// 依次加载并合并多个来源
pub async fn load_all(
    sources: &[Box<dyn ConfigurationSource>],
) -> Result<ContainerConfiguration, ConfigError> {
    let mut configuration = ContainerConfiguration::default();
    for source in sources {
        tracing::debug!("加载组件声明: {}", source.name());
        configuration.merge(source.load().await?);
    }
    Ok(configuration)
}
