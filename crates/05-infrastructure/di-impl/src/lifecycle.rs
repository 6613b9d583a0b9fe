//! 生命周期访问者
//!
//! 每次运行分三步：收集、调用、清空。收集按深度优先遍历容器及其逻辑子容器，
//! 从不向上访问父容器。启动按实例化顺序调用且首个失败立即返回；停止和销毁
//! 按相反顺序调用，失败只记录日志，保证每个组件都有机会被调用。

use di_abstractions::{ContainerHandle, ContainerVisitor, ResolutionSession, ResolvedComponent};
use infrastructure_common::{
    ContainerError, ContainerResult, Disposable, LifecyclePhase, Startable, TypeKey,
};
use std::sync::Arc;
use tracing::{debug, error, info};

/// 生命周期访问者
#[derive(Debug)]
pub struct LifecycleVisitor {
    phase: LifecyclePhase,
    components: Vec<ResolvedComponent>,
}

impl LifecycleVisitor {
    /// 创建访问者
    pub fn new(phase: LifecyclePhase) -> Self {
        Self {
            phase,
            components: Vec::new(),
        }
    }

    /// 启动容器及其子容器中的组件
    pub async fn start(container: &Arc<dyn ContainerHandle>) -> ContainerResult<()> {
        Self::new(LifecyclePhase::Start).run(container).await
    }

    /// 停止容器及其子容器中的组件
    pub async fn stop(container: &Arc<dyn ContainerHandle>) {
        if let Err(e) = Self::new(LifecyclePhase::Stop).run(container).await {
            error!("停止容器失败: {}, 原因: {}", container.name(), e);
        }
    }

    /// 销毁容器及其子容器中的组件
    pub async fn dispose(container: &Arc<dyn ContainerHandle>) {
        if let Err(e) = Self::new(LifecyclePhase::Dispose).run(container).await {
            error!("销毁容器失败: {}, 原因: {}", container.name(), e);
        }
    }

    /// 收集、调用、清空
    pub async fn run(&mut self, container: &Arc<dyn ContainerHandle>) -> ContainerResult<()> {
        let result = match container.head().accept(self) {
            Ok(()) => self.invoke().await,
            Err(e) => Err(e),
        };
        self.components.clear();
        result
    }

    /// 已收集的组件数量
    pub fn collected(&self) -> usize {
        self.components.len()
    }

    async fn invoke(&self) -> ContainerResult<()> {
        info!("生命周期 {}: {} 个组件", self.phase, self.components.len());

        if !self.phase.is_reversed() {
            for component in &self.components {
                let startable = component.cast::<dyn Startable>()?;
                debug!("启动组件: {}", component.key());
                startable.start().await.map_err(|e| {
                    ContainerError::lifecycle(component.key().to_string(), self.phase.method(), e)
                })?;
            }
            return Ok(());
        }

        for component in self.components.iter().rev() {
            if let Err(e) = self.invoke_reversed(component).await {
                error!(
                    "组件 {} 的 {} 调用失败: {}",
                    component.key(),
                    self.phase.method(),
                    e
                );
            }
        }
        Ok(())
    }

    async fn invoke_reversed(&self, component: &ResolvedComponent) -> ContainerResult<()> {
        debug!("{} 组件: {}", self.phase, component.key());
        let outcome = match self.phase {
            LifecyclePhase::Dispose => component.cast::<dyn Disposable>()?.dispose().await,
            _ => component.cast::<dyn Startable>()?.stop().await,
        };
        outcome.map_err(|e| {
            ContainerError::lifecycle(component.key().to_string(), self.phase.method(), e)
        })
    }

    fn collect(&self, container: &Arc<dyn ContainerHandle>) -> ContainerResult<Vec<ResolvedComponent>> {
        let head = container.head();
        match self.phase {
            LifecyclePhase::Start => {
                let session = ResolutionSession::new();
                head.get_component_instances_of_type(&TypeKey::of::<dyn Startable>(), &session)
            }
            LifecyclePhase::Stop => {
                Ok(head.instantiated_components_of_type(&TypeKey::of::<dyn Startable>()))
            }
            LifecyclePhase::Dispose => {
                Ok(head.instantiated_components_of_type(&TypeKey::of::<dyn Disposable>()))
            }
        }
    }
}

impl ContainerVisitor for LifecycleVisitor {
    fn visit_container(&mut self, container: &Arc<dyn ContainerHandle>) -> ContainerResult<()> {
        let components = self.collect(container)?;
        debug!(
            "收集组件: {} 个, 容器: {}, 阶段: {}",
            components.len(),
            container.name(),
            self.phase
        );
        self.components.extend(components);
        Ok(())
    }
}
