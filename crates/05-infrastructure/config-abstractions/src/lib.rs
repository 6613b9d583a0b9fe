//! # Configuration Abstractions
//!
//! 配置抽象层，定义组件声明模型和配置来源接口。
//!
//! ## 核心接口
//!
//! - [`ComponentDeclaration`] - 组件声明
//! - [`PluginDeclaration`] - 插件声明
//! - [`ContainerConfiguration`] - 一个容器的全部声明
//! - [`ConfigurationSource`] - 配置来源接口

pub mod declaration;
pub mod provider;

pub use declaration::*;
pub use provider::*;
