//! 并发注册表节点
//!
//! 拦截器链的最内层，真正保存组件并完成解析。本地未找到时委托父容器的链头，
//! 父容器借出的适配器始终由父容器自己完成，子容器不会越过父容器的链访问其内部。

use crate::lifecycle::LifecycleVisitor;
use crate::registry::{nested_container, ComponentRegistry};
use async_trait::async_trait;
use di_abstractions::{
    Argument, ComponentAdapter, ComponentDefinition, ContainerHandle, ContainerVisitor, Instance,
    Interceptor, InterceptorContext, InterceptorKind, InterceptorOrdering, Parameter,
    ResolutionSession, ResolvedComponent, Resolver, SessionEntry,
};
use infrastructure_common::{ComponentKey, ContainerError, ContainerResult, InitParams, TypeKey};
use std::sync::Arc;
use tracing::{debug, info};

/// 并发注册表节点
pub struct ConcurrentContainer {
    context: InterceptorContext,
    registry: ComponentRegistry,
}

impl ConcurrentContainer {
    /// 拦截器标识
    pub const ID: &'static str = "ConcurrentContainer";

    /// 创建节点
    pub fn new(context: InterceptorContext) -> Self {
        Self {
            context,
            registry: ComponentRegistry::new(),
        }
    }

    /// 拦截器种类
    pub fn kind() -> InterceptorKind {
        InterceptorKind::new(InterceptorOrdering::new(Self::ID), |context| {
            Arc::new(ConcurrentContainer::new(context)) as Arc<dyn Interceptor>
        })
    }

    /// 本地注册表
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    fn parent_head(&self) -> Option<Arc<dyn Interceptor>> {
        self.context.parent().map(|parent| parent.head())
    }

    /// 由本注册表完成实例
    fn get_instance(
        &self,
        adapter: Arc<ComponentAdapter>,
        session: &ResolutionSession,
    ) -> ContainerResult<ResolvedComponent> {
        let holder = self.context.holder()?;

        match session.lookup(holder.id(), adapter.key()) {
            SessionEntry::Ready(instance) => {
                session.mark_uncacheable();
                return Ok(ResolvedComponent::new(adapter, instance));
            }
            SessionEntry::InProgress => {
                return Err(ContainerError::CyclicDependency {
                    key: adapter.key().to_string(),
                });
            }
            SessionEntry::Absent => {}
        }

        let resolver = Resolver::new(Arc::clone(&holder), session);
        let instance = adapter.get_component_instance(&resolver)?;

        if self.registry.add_ordered(&adapter) && !adapter.is_instance() {
            if let Some(management) = holder.head().management_context() {
                management.register(adapter.key(), adapter.implementation_type(), &instance);
            }
        }
        if !adapter.is_singleton() {
            session.mark_uncacheable();
        }
        Ok(ResolvedComponent::new(adapter, instance))
    }

    /// 以探针判断候选容器是否就是本容器（或本容器能看到的祖先）
    fn is_visible_from_here(&self, candidate: &crate::Container) -> ContainerResult<bool> {
        let probe = ComponentKey::probe();
        candidate.register_component(
            ComponentAdapter::instance(probe.clone(), Arc::new(probe.to_string())).build(),
        )?;
        let visible = self.get_component_adapter(&probe).is_some();
        candidate.unregister_component(probe);
        Ok(visible)
    }
}

#[async_trait]
impl Interceptor for ConcurrentContainer {
    fn id(&self) -> &str {
        Self::ID
    }

    fn successor(&self) -> Option<&Arc<dyn Interceptor>> {
        None
    }

    fn get_component_adapter(&self, key: &ComponentKey) -> Option<Arc<ComponentAdapter>> {
        self.registry
            .lookup_by_key(key)
            .or_else(|| self.parent_head()?.get_component_adapter(key))
    }

    fn get_component_adapter_of_type(
        &self,
        ty: &TypeKey,
    ) -> ContainerResult<Option<Arc<ComponentAdapter>>> {
        if let Some(adapter) = self.registry.lookup_by_type(ty)? {
            return Ok(Some(adapter));
        }
        match self.parent_head() {
            Some(parent) => parent.get_component_adapter_of_type(ty),
            None => Ok(None),
        }
    }

    fn get_component_adapters_of_type(&self, ty: &TypeKey) -> Vec<Arc<ComponentAdapter>> {
        self.registry.lookup_all_by_type(ty)
    }

    fn get_component_adapters(&self) -> Vec<Arc<ComponentAdapter>> {
        self.registry.adapters()
    }

    fn instantiation_order(&self) -> Vec<Arc<ComponentAdapter>> {
        self.registry.instantiation_order()
    }

    fn get_component_instance(
        &self,
        key: &ComponentKey,
        session: &ResolutionSession,
    ) -> ContainerResult<Option<ResolvedComponent>> {
        if let Some(adapter) = self.registry.lookup_by_key(key) {
            return self.get_instance(adapter, session).map(Some);
        }
        match self.parent_head() {
            Some(parent) => parent.get_component_instance(key, session),
            None => Ok(None),
        }
    }

    fn get_component_instance_of_type(
        &self,
        ty: &TypeKey,
        session: &ResolutionSession,
    ) -> ContainerResult<Option<ResolvedComponent>> {
        if let Some(adapter) = self.registry.lookup_by_type(ty)? {
            return self.get_instance(adapter, session).map(Some);
        }
        match self.parent_head() {
            Some(parent) => parent.get_component_instance_of_type(ty, session),
            None => Ok(None),
        }
    }

    fn get_component_instances_of_type(
        &self,
        ty: &TypeKey,
        session: &ResolutionSession,
    ) -> ContainerResult<Vec<ResolvedComponent>> {
        let mut resolved = self
            .registry
            .lookup_all_by_type(ty)
            .into_iter()
            .map(|adapter| self.get_instance(adapter, session))
            .collect::<ContainerResult<Vec<_>>>()?;

        resolved.sort_by_key(|component| {
            self.registry
                .order_position(component.adapter())
                .unwrap_or(usize::MAX)
        });
        Ok(resolved)
    }

    fn instantiated_components_of_type(&self, ty: &TypeKey) -> Vec<ResolvedComponent> {
        self.registry.instances_in_order(ty)
    }

    fn register_component(
        &self,
        adapter: Arc<ComponentAdapter>,
    ) -> ContainerResult<Arc<ComponentAdapter>> {
        let nested = nested_container(&adapter);
        if let Some(candidate) = &nested {
            if self.is_visible_from_here(candidate)? {
                return Err(ContainerError::SelfRegistration {
                    container: candidate.name().to_string(),
                });
            }
        }

        let registered = self.registry.register(adapter)?;
        debug!(
            "注册组件: {} ({}) -> {}",
            registered.key(),
            registered.implementation_type().short_name(),
            self.context.name()
        );
        if let Some(child) = nested {
            info!("注册子容器: {} -> {}", child.name(), self.context.name());
            self.registry.add_child(child);
        }
        Ok(registered)
    }

    fn unregister_component(&self, key: &ComponentKey) -> Option<Arc<ComponentAdapter>> {
        let removed = self.registry.unregister(key)?;
        debug!("注销组件: {} -> {}", key, self.context.name());
        Some(removed)
    }

    fn create_component(
        &self,
        definition: &ComponentDefinition,
        params: &InitParams,
        session: &ResolutionSession,
    ) -> ContainerResult<Instance> {
        let holder = self.context.holder()?;
        let head = holder.head();
        let mut unresolved: Option<&Parameter> = None;

        'constructors: for constructor in definition.constructors() {
            let mut arguments = Vec::with_capacity(constructor.arity());
            for parameter in constructor.parameters() {
                match parameter {
                    Parameter::InitParams => arguments.push(Argument::InitParams(params.clone())),
                    Parameter::Dependency(ty) => {
                        match head.get_component_instance_of_type(ty, session)? {
                            Some(dependency) => {
                                arguments.push(Argument::Dependency(dependency.cast_erased(ty)?))
                            }
                            None => {
                                unresolved = Some(parameter);
                                continue 'constructors;
                            }
                        }
                    }
                }
            }

            return constructor.invoke(arguments).map_err(|e| {
                ContainerError::creation(definition.implementation().name(), e)
            });
        }

        Err(ContainerError::UnsatisfiableConstructor {
            implementation: definition.implementation().name().to_string(),
            parameter: unresolved.map(ToString::to_string),
        })
    }

    fn accept(&self, visitor: &mut dyn ContainerVisitor) -> ContainerResult<()> {
        let holder = self.context.holder()?;
        visitor.visit_container(&holder)?;
        for child in self.registry.children() {
            child.accept(visitor)?;
        }
        Ok(())
    }

    async fn start(&self) -> ContainerResult<()> {
        let holder = self.context.holder()?;
        LifecycleVisitor::start(&holder).await
    }

    async fn stop(&self) {
        if let Ok(holder) = self.context.holder() {
            LifecycleVisitor::stop(&holder).await;
        }
    }

    async fn dispose(&self) {
        if let Ok(holder) = self.context.holder() {
            LifecycleVisitor::dispose(&holder).await;
        }
    }
}
