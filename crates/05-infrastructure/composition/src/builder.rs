//! 内核构建器

use crate::kernel::Kernel;
use crate::logging::LoggingConfig;
use config_abstractions::{load_all, ConfigurationSource};
use config_impl::{FileConfigurationSource, SettingsBinder};
use di_abstractions::{
    ContainerConfig, InterceptorChainFactory, InterceptorDiscovery, InterceptorKind,
    StaticInterceptorDiscovery,
};
use di_impl::{ComponentCatalog, Container, DefaultInterceptorChainFactory, RootContainer};
use infrastructure_common::InfrastructureResult;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 设置文件中的容器配置节
pub const CONTAINER_SECTION: &str = "container";
/// 设置文件中的日志配置节
pub const LOGGING_SECTION: &str = "logging";

/// 内核构建器
///
/// 收集声明来源、组件目录、拦截器发现和设置，构建出一个根容器延迟构建的 [`Kernel`]。
pub struct KernelBuilder {
    root_name: String,
    sources: Vec<Box<dyn ConfigurationSource>>,
    catalog: ComponentCatalog,
    interceptors: Vec<InterceptorKind>,
    discovery: Option<Arc<dyn InterceptorDiscovery>>,
    settings: Option<SettingsBinder>,
    container_config: Option<ContainerConfig>,
    logging_config: Option<LoggingConfig>,
}

impl KernelBuilder {
    /// 创建内核构建器
    pub fn new() -> Self {
        Self {
            root_name: "root".to_string(),
            sources: Vec::new(),
            catalog: ComponentCatalog::new(),
            interceptors: Vec::new(),
            discovery: None,
            settings: None,
            container_config: None,
            logging_config: None,
        }
    }

    /// 根容器名称
    pub fn root_name(mut self, name: impl Into<String>) -> Self {
        self.root_name = name.into();
        self
    }

    /// 添加组件声明来源
    pub fn with_source<S: ConfigurationSource + 'static>(mut self, source: S) -> Self {
        info!("添加组件声明来源: {}", source.name());
        self.sources.push(Box::new(source));
        self
    }

    /// 添加组件声明文件
    pub fn with_declarations_file(self, path: impl AsRef<Path>) -> Self {
        self.with_source(FileConfigurationSource::new(path))
    }

    /// 设置组件目录
    pub fn with_catalog(mut self, catalog: ComponentCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// 添加可插拔拦截器
    pub fn with_interceptor(mut self, kind: InterceptorKind) -> Self {
        debug!("添加可插拔拦截器: {}", kind.id());
        self.interceptors.push(kind);
        self
    }

    /// 使用自定义拦截器发现器
    pub fn with_discovery(mut self, discovery: Arc<dyn InterceptorDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// 从设置绑定容器配置和日志配置
    pub fn with_settings(mut self, settings: SettingsBinder) -> Self {
        self.settings = Some(settings);
        self
    }

    /// 显式指定容器配置，优先于设置
    pub fn with_container_config(mut self, config: ContainerConfig) -> Self {
        self.container_config = Some(config);
        self
    }

    /// 配置日志，优先于设置
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging_config = Some(config);
        self
    }

    fn resolve_settings(&self) -> InfrastructureResult<(ContainerConfig, Option<LoggingConfig>)> {
        let container_config = match (&self.container_config, &self.settings) {
            (Some(config), _) => config.clone(),
            (None, Some(settings)) => settings.bind_or_default(CONTAINER_SECTION)?,
            (None, None) => ContainerConfig::default(),
        };
        let logging_config = match (&self.logging_config, &self.settings) {
            (Some(config), _) => Some(config.clone()),
            (None, Some(settings)) => Some(settings.bind_or_default(LOGGING_SECTION)?),
            (None, None) => None,
        };
        Ok((container_config, logging_config))
    }

    fn chain_factory(
        discovery: Option<Arc<dyn InterceptorDiscovery>>,
        interceptors: Vec<InterceptorKind>,
        strict: bool,
    ) -> Arc<dyn InterceptorChainFactory> {
        let discovery: Arc<dyn InterceptorDiscovery> = match discovery {
            Some(discovery) => {
                if !interceptors.is_empty() {
                    warn!(
                        "已指定拦截器发现器 {}, 忽略 {} 个单独添加的拦截器",
                        discovery.name(),
                        interceptors.len()
                    );
                }
                discovery
            }
            None => Arc::new(
                interceptors
                    .into_iter()
                    .fold(StaticInterceptorDiscovery::new(), StaticInterceptorDiscovery::with),
            ),
        };
        Arc::new(DefaultInterceptorChainFactory::new(discovery).strict(strict))
    }

    /// 构建内核
    ///
    /// 初始化日志并加载全部声明；根容器在第一次访问时才组装拦截器链并注册组件。
    pub async fn build(self) -> InfrastructureResult<Kernel> {
        let (container_config, logging_config) = self.resolve_settings()?;
        if let Some(logging) = &logging_config {
            logging.initialize()?;
        }

        info!("开始构建内核: {}", self.root_name);
        let configuration = Arc::new(load_all(&self.sources).await?);
        if configuration.is_empty() {
            warn!("没有加载到任何组件声明");
        }

        let factory = Self::chain_factory(
            self.discovery,
            self.interceptors,
            container_config.strict_interceptor_ordering,
        );
        let catalog = self.catalog;
        let root_name = self.root_name;
        let declarations = Arc::clone(&configuration);

        let root = RootContainer::new(move || {
            let container = Container::builder(root_name.clone())
                .chain_factory(Arc::clone(&factory))
                .config(container_config.clone())
                .build()?;
            catalog.populate(&container, &declarations)?;
            Ok(container)
        });

        info!("内核构建完成, 声明组件 {} 个", configuration.components.len());
        Ok(Kernel::new(Arc::new(root), configuration))
    }
}

impl Default for KernelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KernelBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sources: Vec<&str> = self.sources.iter().map(|source| source.name()).collect();
        f.debug_struct("KernelBuilder")
            .field("root_name", &self.root_name)
            .field("sources", &sources)
            .field("catalog", &self.catalog)
            .field("interceptors", &self.interceptors.len())
            .field("container_config", &self.container_config)
            .field("logging_config", &self.logging_config)
            .finish()
    }
}

