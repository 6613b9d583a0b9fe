//! # 依赖注入具体实现
//!
//! 提供组件注册表、拦截器链上的各个节点、生命周期访问者以及容器本身。
//!
//! 默认链从内到外为：
//!
//! 1. [`ConcurrentContainer`] - 线程安全的注册表与解析引擎
//! 2. [`CachingContainer`] - 查找缓存
//! 3. [`ManageableContainer`] - 管理导出
//!
//! 可插拔节点（例如 [`TenancyContainer`]）按排序约束插入。

pub mod caching;
pub mod catalog;
pub mod chain;
pub mod concurrent;
pub mod container;
pub mod lifecycle;
pub mod management;
pub mod registry;
pub mod root;
pub mod tenancy;

pub use caching::CachingContainer;
pub use catalog::ComponentCatalog;
pub use chain::{resolve_interceptor_order, DefaultInterceptorChainFactory};
pub use concurrent::ConcurrentContainer;
pub use container::{Container, ContainerBuilder};
pub use lifecycle::LifecycleVisitor;
pub use management::ManageableContainer;
pub use registry::ComponentRegistry;
pub use root::RootContainer;
pub use tenancy::{TenancyContainer, TenantRegistry};
