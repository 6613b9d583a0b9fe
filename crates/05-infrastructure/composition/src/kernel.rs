//! 内核主入口

use crate::builder::KernelBuilder;
use chrono::{DateTime, Utc};
use config_abstractions::ContainerConfiguration;
use di_impl::{Container, RootContainer};
use infrastructure_common::{InfrastructureError, InfrastructureResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

/// 内核运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KernelStatus {
    /// 已构建，根容器尚未启动
    Initialized,
    /// 启动中
    Starting,
    /// 运行中
    Running,
    /// 停止中
    Stopping,
    /// 已停止
    Stopped,
    /// 启动失败
    Failed,
}

/// 内核统计信息
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KernelMetrics {
    /// 启动时间
    pub start_time: Option<DateTime<Utc>>,
    /// 停止时间
    pub stop_time: Option<DateTime<Utc>>,
    /// 声明的组件数量
    pub declared_components: usize,
}

/// 内核
///
/// 持有根容器和加载好的组件声明。根容器在第一次访问时构建。
pub struct Kernel {
    root: Arc<RootContainer>,
    configuration: Arc<ContainerConfiguration>,
    status: RwLock<KernelStatus>,
    metrics: RwLock<KernelMetrics>,
}

impl Kernel {
    /// 创建内核构建器
    pub fn builder() -> KernelBuilder {
        KernelBuilder::new()
    }

    pub(crate) fn new(root: Arc<RootContainer>, configuration: Arc<ContainerConfiguration>) -> Self {
        let metrics = KernelMetrics {
            declared_components: configuration.components.len(),
            ..KernelMetrics::default()
        };
        Self {
            root,
            configuration,
            status: RwLock::new(KernelStatus::Initialized),
            metrics: RwLock::new(metrics),
        }
    }

    /// 根容器，必要时构建
    pub fn container(&self) -> InfrastructureResult<Container> {
        Ok(self.root.get()?)
    }

    /// 根容器持有者
    pub fn root(&self) -> &Arc<RootContainer> {
        &self.root
    }

    /// 加载的组件声明
    pub fn configuration(&self) -> &ContainerConfiguration {
        &self.configuration
    }

    /// 当前状态
    pub async fn status(&self) -> KernelStatus {
        *self.status.read().await
    }

    /// 统计信息
    pub async fn metrics(&self) -> KernelMetrics {
        self.metrics.read().await.clone()
    }

    /// 启动内核
    pub async fn start(&self) -> InfrastructureResult<()> {
        info!("启动内核");
        *self.status.write().await = KernelStatus::Starting;

        let outcome = match self.root.get() {
            Ok(container) => container.start().await,
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            error!("内核启动失败: {}", e);
            *self.status.write().await = KernelStatus::Failed;
            return Err(e.into());
        }

        self.metrics.write().await.start_time = Some(Utc::now());
        *self.status.write().await = KernelStatus::Running;
        info!("内核启动完成");
        Ok(())
    }

    /// 停止内核，根容器保留，可以再次启动
    pub async fn stop(&self) -> InfrastructureResult<()> {
        info!("停止内核");
        *self.status.write().await = KernelStatus::Stopping;

        if let Some(container) = self.root.current() {
            container
                .stop()
                .await
                .map_err(|e| InfrastructureError::ShutdownFailed {
                    message: e.to_string(),
                })?;
        }

        self.metrics.write().await.stop_time = Some(Utc::now());
        *self.status.write().await = KernelStatus::Stopped;
        info!("内核停止完成");
        Ok(())
    }

    /// 关闭内核：停止并销毁根容器
    pub async fn shutdown(&self) -> InfrastructureResult<()> {
        info!("关闭内核");
        self.root
            .shutdown()
            .await
            .map_err(|e| InfrastructureError::ShutdownFailed {
                message: e.to_string(),
            })?;

        self.metrics.write().await.stop_time = Some(Utc::now());
        *self.status.write().await = KernelStatus::Stopped;
        Ok(())
    }

    /// 把根容器安装为进程级根容器
    pub fn install_global(&self) -> Option<Arc<RootContainer>> {
        RootContainer::install_global(Arc::clone(&self.root))
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("root", &self.root)
            .field("declared_components", &self.configuration.components.len())
            .finish()
    }
}
