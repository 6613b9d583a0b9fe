//! # Configuration Implementation
//!
//! 组件声明来源和类型化设置绑定的具体实现。
//!
//! ## 主要组件
//!
//! - [`FileConfigurationSource`] - 从 TOML / JSON / YAML 文件加载组件声明
//! - [`InMemoryConfigurationSource`] - 内存中的组件声明
//! - [`SettingsBinder`] - 文件与环境变量分层的类型化设置绑定

pub mod binder;
pub mod sources;

pub use binder::*;
pub use sources::*;
