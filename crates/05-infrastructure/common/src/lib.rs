//! # Infrastructure Common
//!
//! 这个 crate 提供了 Lorn Kernel 组件容器的公共类型。
//!
//! ## 核心组件
//!
//! - [`ComponentKey`] / [`TypeKey`] - 组件键与类型键
//! - [`InitParams`] - 构造器注入的初始化参数
//! - [`Startable`] / [`Disposable`] - 组件生命周期能力
//! - [`ContainerError`] - 容器错误分类
//!
//! ## 设计原则
//!
//! - 基于 Rust 类型系统的编译时安全
//! - 生命周期调用异步，解析与注册同步

pub mod configuration;
pub mod errors;
pub mod lifecycle;
pub mod metadata;

pub use configuration::*;
pub use errors::*;
pub use lifecycle::*;
pub use metadata::*;
