//! 容器抽象接口
//!
//! 容器是拦截器链的持有者。链上的每个节点实现 [`Interceptor`]，
//! 持有指向后继节点的引用，未覆盖的操作默认委托给后继节点。

use crate::adapter::{ComponentAdapter, Instance, ResolvedComponent};
use crate::factory::ComponentDefinition;
use crate::management::ManagementContext;
use crate::resolver::ResolutionSession;
use async_trait::async_trait;
use infrastructure_common::{
    ComponentKey, ContainerError, ContainerResult, InitParams, TypeKey,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// 容器句柄
///
/// 拦截器通过它回到持有者，从链头开始解析依赖。
pub trait ContainerHandle: Send + Sync {
    /// 容器标识
    fn id(&self) -> Uuid;

    /// 容器名称
    fn name(&self) -> &str;

    /// 拦截器链头
    fn head(&self) -> Arc<dyn Interceptor>;

    /// 父容器
    fn parent(&self) -> Option<Arc<dyn ContainerHandle>>;

    /// 容器配置
    fn config(&self) -> &ContainerConfig;
}

/// 容器访问者
pub trait ContainerVisitor {
    /// 访问一个容器
    fn visit_container(&mut self, container: &Arc<dyn ContainerHandle>) -> ContainerResult<()>;
}

/// 拦截器 trait
///
/// 只有最内层的并发注册表节点真正保存组件，其余节点在委托前后附加行为。
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// 拦截器标识，用于排序约束
    fn id(&self) -> &str;

    /// 后继节点
    fn successor(&self) -> Option<&Arc<dyn Interceptor>>;

    /// 按键获取适配器，本地未找到时查找父容器
    fn get_component_adapter(&self, key: &ComponentKey) -> Option<Arc<ComponentAdapter>> {
        self.successor()
            .and_then(|successor| successor.get_component_adapter(key))
    }

    /// 按类型获取唯一适配器，本地未找到时查找父容器
    fn get_component_adapter_of_type(
        &self,
        ty: &TypeKey,
    ) -> ContainerResult<Option<Arc<ComponentAdapter>>> {
        match self.successor() {
            Some(successor) => successor.get_component_adapter_of_type(ty),
            None => Ok(None),
        }
    }

    /// 本地所有可赋值给指定类型的适配器
    fn get_component_adapters_of_type(&self, ty: &TypeKey) -> Vec<Arc<ComponentAdapter>> {
        self.successor()
            .map(|successor| successor.get_component_adapters_of_type(ty))
            .unwrap_or_default()
    }

    /// 本地所有适配器，按注册顺序
    fn get_component_adapters(&self) -> Vec<Arc<ComponentAdapter>> {
        self.successor()
            .map(|successor| successor.get_component_adapters())
            .unwrap_or_default()
    }

    /// 本地已实例化的适配器，按实例化顺序
    fn instantiation_order(&self) -> Vec<Arc<ComponentAdapter>> {
        self.successor()
            .map(|successor| successor.instantiation_order())
            .unwrap_or_default()
    }

    /// 按键获取组件实例
    fn get_component_instance(
        &self,
        key: &ComponentKey,
        session: &ResolutionSession,
    ) -> ContainerResult<Option<ResolvedComponent>> {
        match self.successor() {
            Some(successor) => successor.get_component_instance(key, session),
            None => Ok(None),
        }
    }

    /// 按类型获取组件实例
    fn get_component_instance_of_type(
        &self,
        ty: &TypeKey,
        session: &ResolutionSession,
    ) -> ContainerResult<Option<ResolvedComponent>> {
        match self.successor() {
            Some(successor) => successor.get_component_instance_of_type(ty, session),
            None => Ok(None),
        }
    }

    /// 本地所有可赋值给指定类型的组件实例，按实例化顺序，必要时创建
    fn get_component_instances_of_type(
        &self,
        ty: &TypeKey,
        session: &ResolutionSession,
    ) -> ContainerResult<Vec<ResolvedComponent>> {
        match self.successor() {
            Some(successor) => successor.get_component_instances_of_type(ty, session),
            None => Ok(Vec::new()),
        }
    }

    /// 本地已经存在的、可赋值给指定类型的组件实例，不触发创建
    fn instantiated_components_of_type(&self, ty: &TypeKey) -> Vec<ResolvedComponent> {
        self.successor()
            .map(|successor| successor.instantiated_components_of_type(ty))
            .unwrap_or_default()
    }

    /// 注册组件
    fn register_component(
        &self,
        adapter: Arc<ComponentAdapter>,
    ) -> ContainerResult<Arc<ComponentAdapter>> {
        match self.successor() {
            Some(successor) => successor.register_component(adapter),
            None => Err(ContainerError::BrokenChain {
                interceptor: self.id().to_string(),
            }),
        }
    }

    /// 注销组件
    fn unregister_component(&self, key: &ComponentKey) -> Option<Arc<ComponentAdapter>> {
        self.successor()
            .and_then(|successor| successor.unregister_component(key))
    }

    /// 通过构造器创建组件实例
    fn create_component(
        &self,
        definition: &ComponentDefinition,
        params: &InitParams,
        session: &ResolutionSession,
    ) -> ContainerResult<Instance> {
        match self.successor() {
            Some(successor) => successor.create_component(definition, params, session),
            None => Err(ContainerError::BrokenChain {
                interceptor: self.id().to_string(),
            }),
        }
    }

    /// 清空查找缓存
    fn invalidate_caches(&self) {
        if let Some(successor) = self.successor() {
            successor.invalidate_caches();
        }
    }

    /// 接受访问者：先访问持有者，再访问逻辑子容器
    fn accept(&self, visitor: &mut dyn ContainerVisitor) -> ContainerResult<()> {
        match self.successor() {
            Some(successor) => successor.accept(visitor),
            None => Ok(()),
        }
    }

    /// 管理上下文
    fn management_context(&self) -> Option<Arc<ManagementContext>> {
        self.successor()
            .and_then(|successor| successor.management_context())
    }

    /// 管理对象作用域名称
    fn scoping_object_name(&self) -> Option<String> {
        self.successor()
            .and_then(|successor| successor.scoping_object_name())
    }

    /// 启动
    async fn start(&self) -> ContainerResult<()> {
        match self.successor() {
            Some(successor) => successor.start().await,
            None => Ok(()),
        }
    }

    /// 停止，失败只记录日志
    async fn stop(&self) {
        if let Some(successor) = self.successor() {
            successor.stop().await;
        }
    }

    /// 销毁，失败只记录日志
    async fn dispose(&self) {
        if let Some(successor) = self.successor() {
            successor.dispose().await;
        }
    }
}

/// 容器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// 开发模式，输出更多诊断信息
    pub developing: bool,
    /// 拦截器排序引用无法解析时是否直接失败
    pub strict_interceptor_ordering: bool,
    /// 最大解析深度
    pub max_resolution_depth: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            developing: false,
            strict_interceptor_ordering: false,
            max_resolution_depth: 100,
        }
    }
}

impl ContainerConfig {
    /// 开发模式配置
    pub fn development() -> Self {
        Self {
            developing: true,
            ..Self::default()
        }
    }
}
