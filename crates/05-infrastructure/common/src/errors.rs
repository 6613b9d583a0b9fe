//! 错误类型定义

use thiserror::Error;

/// 通用的装箱错误类型，生命周期方法和导出器使用
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    #[error("配置文件读取失败: {source}")]
    FileReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("配置解析失败: {source}")]
    ParseError { source: BoxError },

    #[error("配置序列化失败: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },

    #[error("配置键不存在: {key}")]
    KeyNotFound { key: String },

    #[error("配置类型转换失败: {message}")]
    TypeConversionError { message: String },

    #[error("不支持的配置格式: {extension}")]
    UnsupportedFormat { extension: String },
}

impl ConfigError {
    /// 创建解析错误
    pub fn parse_error(source: impl Into<BoxError>) -> Self {
        Self::ParseError {
            source: source.into(),
        }
    }
}

/// 容器错误类型
///
/// 注册、解析和生命周期调用产生的所有错误都会同步返回给调用者。
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("组件键重复: {key}")]
    DuplicateKey { key: String },

    #[error("类型 {requested} 存在多个候选实现: {candidates:?}")]
    AmbiguousType {
        requested: String,
        candidates: Vec<String>,
    },

    #[error(
        "无法为 {implementation} 找到可满足的构造器, 未解析的参数: {}",
        .parameter.as_deref().unwrap_or("<无构造器>")
    )]
    UnsatisfiableConstructor {
        implementation: String,
        parameter: Option<String>,
    },

    #[error("容器 {container} 不能注册为自身的组件")]
    SelfRegistration { container: String },

    #[error("根容器已在当前线程中启动构建")]
    AlreadyBooting,

    #[error("组件 {component} 的 {method} 调用失败: {source}")]
    LifecycleInvocation {
        component: String,
        method: &'static str,
        source: BoxError,
    },

    #[error("检测到循环依赖: {key} 的构造尚未完成")]
    CyclicDependency { key: String },

    #[error("解析深度超过上限 {max_depth}: {key}")]
    ResolutionDepthExceeded { key: String, max_depth: usize },

    #[error("组件创建失败: {implementation}, 原因: {source}")]
    ComponentCreation {
        implementation: String,
        source: BoxError,
    },

    #[error("组件 {key} 的实现 {implementation} 不提供类型 {expected}")]
    TypeMismatch {
        key: String,
        expected: String,
        implementation: String,
    },

    #[error("组件未注册: {type_name}")]
    ComponentNotFound { type_name: String },

    #[error("组件目录中不存在实现: {name}")]
    UnknownImplementation { name: String },

    #[error("拦截器 {interceptor} 引用了未知的拦截器 {reference}")]
    UnresolvedInterceptorReference {
        interceptor: String,
        reference: String,
    },

    #[error("拦截器链为空")]
    EmptyInterceptorChain,

    #[error("拦截器 {interceptor} 没有后继节点")]
    BrokenChain { interceptor: String },

    #[error("容器已被释放: {container}")]
    ContainerDetached { container: String },

    #[error("容器已销毁: {container}")]
    Disposed { container: String },
}

impl ContainerError {
    /// 创建组件创建失败错误
    pub fn creation(implementation: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::ComponentCreation {
            implementation: implementation.into(),
            source: source.into(),
        }
    }

    /// 创建生命周期调用错误
    pub fn lifecycle(component: impl Into<String>, method: &'static str, source: BoxError) -> Self {
        Self::LifecycleInvocation {
            component: component.into(),
            method,
            source,
        }
    }
}

/// 基础设施错误类型
#[derive(Error, Debug)]
pub enum InfrastructureError {
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    #[error("容器错误: {0}")]
    Container(#[from] ContainerError),

    #[error("启动失败: {message}")]
    BootstrapFailed { message: String },

    #[error("关闭失败: {message}")]
    ShutdownFailed { message: String },
}

/// 结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type ContainerResult<T> = Result<T, ContainerError>;
pub type InfrastructureResult<T> = Result<T, InfrastructureError>;
