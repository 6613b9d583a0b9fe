//! 日志初始化

use infrastructure_common::{InfrastructureError, InfrastructureResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别或过滤指令，例如 `info` 或 `di_impl=debug,info`
    pub level: String,
    /// 是否显示目标
    pub show_target: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
    /// 是否显示文件名和行号
    pub show_location: bool,
    /// 是否使用 JSON 格式
    pub json_format: bool,
    /// 是否输出 ANSI 颜色
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_target: true,
            show_thread_ids: false,
            show_location: false,
            json_format: false,
            ansi: true,
        }
    }
}

impl LoggingConfig {
    /// 创建开发环境日志配置
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            show_thread_ids: true,
            show_location: true,
            ..Self::default()
        }
    }

    /// 创建生产环境日志配置
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            show_target: false,
            json_format: true,
            ansi: false,
            ..Self::default()
        }
    }

    /// 设置级别
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// 过滤器，`RUST_LOG` 优先
    pub fn env_filter(&self) -> InfrastructureResult<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.level).map_err(|e| InfrastructureError::BootstrapFailed {
            message: format!("日志级别无效: {}, 原因: {}", self.level, e),
        })
    }

    /// 初始化全局日志订阅者
    ///
    /// 已经存在全局订阅者时不做任何事，重复调用是安全的。
    pub fn initialize(&self) -> InfrastructureResult<()> {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(self.env_filter()?)
            .with_target(self.show_target)
            .with_thread_ids(self.show_thread_ids)
            .with_file(self.show_location)
            .with_line_number(self.show_location)
            .with_ansi(self.ansi);

        let result = if self.json_format {
            builder.json().try_init()
        } else {
            builder.try_init()
        };

        match result {
            Ok(()) => info!("日志系统初始化完成, 级别: {}", self.level),
            Err(e) => debug!("日志系统已初始化, 跳过: {}", e),
        }
        Ok(())
    }
}
