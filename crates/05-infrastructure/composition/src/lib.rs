//! # 内核组合层
//!
//! 把设置绑定、日志初始化、组件声明加载和根容器引导组合成一个可运行的内核。
//!
//! ## 主要功能
//!
//! - **内核构建器**: 收集声明来源、组件目录和可插拔拦截器
//! - **设置绑定**: 从文件和环境变量绑定容器配置与日志配置
//! - **生命周期管理**: 启动、停止并关闭根容器
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use di_impl::ComponentCatalog;
//! use infrastructure_composition::{KernelBuilder, LoggingConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let kernel = KernelBuilder::new()
//!         .with_logging(LoggingConfig::development())
//!         .with_declarations_file("config/components.toml")
//!         .with_catalog(ComponentCatalog::new())
//!         .build()
//!         .await?;
//!
//!     kernel.start().await?;
//!     println!("拦截器链: {:?}", kernel.container()?.interceptor_ids());
//!     kernel.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod kernel;
pub mod logging;

pub use builder::{KernelBuilder, CONTAINER_SECTION, LOGGING_SECTION};
pub use kernel::{Kernel, KernelMetrics, KernelStatus};
pub use logging::LoggingConfig;

// 重新导出错误类型
pub use infrastructure_common::InfrastructureError;

#[cfg(test)]
mod tests;
