//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义组件容器的核心类型和接口。
//!
//! ## 核心接口
//!
//! - [`ComponentAdapter`] - 注册单元：键、实现类型与实例策略
//! - [`ComponentDefinition`] - 以显式构造器描述的组件类型
//! - [`ResolutionSession`] / [`Resolver`] - 打破构造循环的解析会话
//! - [`Interceptor`] - 拦截器链节点
//! - [`InterceptorChainFactory`] - 拦截器链工厂
//! - [`ManagementContext`] - 管理导出上下文
//! - [`TenantsContext`] - 多租户覆盖层

pub mod adapter;
pub mod container;
pub mod discovery;
pub mod factory;
pub mod management;
pub mod resolver;
pub mod tenancy;

pub use adapter::*;
pub use container::*;
pub use discovery::*;
pub use factory::*;
pub use management::*;
pub use resolver::*;
pub use tenancy::*;
