//! 管理导出节点

use async_trait::async_trait;
use di_abstractions::{
    ComponentAdapter, ContainerHandle, Interceptor, InterceptorContext, InterceptorKind,
    InterceptorOrdering, ManagementContext, ManagementExporter,
};
use infrastructure_common::{ComponentKey, ContainerError, ContainerResult, TypeKey};
use std::sync::Arc;
use tracing::debug;

/// 管理导出节点
///
/// 以实例注册的组件在注册时导出，通过构造器创建的组件在首次实例化时由
/// 注册表节点导出。提供 `dyn ManagementExporter` 的组件本身会成为本容器的导出器。
pub struct ManageableContainer {
    context: InterceptorContext,
    management: Arc<ManagementContext>,
}

impl ManageableContainer {
    /// 拦截器标识
    pub const ID: &'static str = "Management";

    /// 对象名称中表示容器的属性
    pub const SCOPE_PROPERTY: &'static str = "container";

    /// 创建节点，管理上下文挂在父容器的上下文之下
    pub fn new(context: InterceptorContext) -> Self {
        let parent = context
            .parent()
            .and_then(|parent| parent.head().management_context());
        let management = Arc::new(ManagementContext::new(
            parent,
            Self::SCOPE_PROPERTY,
            context.name(),
        ));
        Self {
            context,
            management,
        }
    }

    /// 拦截器种类
    pub fn kind() -> InterceptorKind {
        InterceptorKind::new(InterceptorOrdering::new(Self::ID), |context| {
            Arc::new(ManageableContainer::new(context)) as Arc<dyn Interceptor>
        })
    }

    fn export_instance(&self, adapter: &ComponentAdapter) {
        if matches!(adapter.key(), ComponentKey::Probe(_)) {
            return;
        }
        let Some(instance) = adapter.existing_instance() else {
            return;
        };

        let exporter_type = TypeKey::of::<dyn ManagementExporter>();
        if adapter.provides(&exporter_type) {
            match adapter.cast::<dyn ManagementExporter>(instance) {
                Ok(exporter) => self.management.add_exporter(exporter),
                Err(e) => debug!("忽略管理导出器: {}", e),
            }
        }
        self.management
            .register(adapter.key(), adapter.implementation_type(), instance);
    }
}

#[async_trait]
impl Interceptor for ManageableContainer {
    fn id(&self) -> &str {
        Self::ID
    }

    fn successor(&self) -> Option<&Arc<dyn Interceptor>> {
        self.context.successor()
    }

    fn register_component(
        &self,
        adapter: Arc<ComponentAdapter>,
    ) -> ContainerResult<Arc<ComponentAdapter>> {
        let registered = match self.successor() {
            Some(successor) => successor.register_component(adapter)?,
            None => {
                return Err(ContainerError::BrokenChain {
                    interceptor: Self::ID.to_string(),
                })
            }
        };
        if registered.is_instance() {
            self.export_instance(&registered);
        }
        Ok(registered)
    }

    fn unregister_component(&self, key: &ComponentKey) -> Option<Arc<ComponentAdapter>> {
        let removed = self
            .successor()
            .and_then(|successor| successor.unregister_component(key))?;
        self.management.unregister(key);
        Some(removed)
    }

    fn management_context(&self) -> Option<Arc<ManagementContext>> {
        Some(Arc::clone(&self.management))
    }

    fn scoping_object_name(&self) -> Option<String> {
        Some(self.management.object_name().to_string())
    }

    async fn stop(&self) {
        if let Some(successor) = self.successor() {
            successor.stop().await;
        }
        debug!("撤销管理导出: {}", self.management.object_name());
        self.management.unregister_all();
    }
}
