//! 组件生命周期管理

use crate::errors::BoxError;
use async_trait::async_trait;
use std::fmt;

/// 可启动组件 trait
///
/// 容器启动时按实例化顺序调用 `start`，停止时按相反顺序调用 `stop`。
#[async_trait]
pub trait Startable: Send + Sync {
    /// 启动组件
    async fn start(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// 停止组件
    async fn stop(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// 可销毁组件 trait
#[async_trait]
pub trait Disposable: Send + Sync {
    /// 释放组件持有的资源
    async fn dispose(&self) -> Result<(), BoxError>;
}

/// 生命周期方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    Start,
    Stop,
    Dispose,
}

impl LifecyclePhase {
    /// 方法名称
    pub fn method(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Dispose => "dispose",
        }
    }

    /// 是否按实例化逆序调用
    pub fn is_reversed(&self) -> bool {
        !matches!(self, Self::Start)
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

/// 容器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContainerState {
    /// 已创建，尚未启动
    #[default]
    Initialized,
    /// 已启动
    Started,
    /// 已停止
    Stopped,
    /// 已销毁，不能再次启动或停止
    Disposed,
}

impl ContainerState {
    /// 是否已销毁
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initialized => "initialized",
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Disposed => "disposed",
        };
        f.write_str(name)
    }
}
