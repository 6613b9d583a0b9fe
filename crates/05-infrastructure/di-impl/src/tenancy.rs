//! 多租户覆盖层
//!
//! 查找时先询问租户上下文，再交给后继节点；键被租户上下文接受的注册
//! 只进入覆盖层。“按类型取全部”的查询以组件键合并，覆盖层的条目替换
//! 普通注册表中同键的条目。
//!
//! 每个容器持有自己的租户上下文。覆盖层未命中时沿后继节点下行，由最内层
//! 节点转交父容器，父容器看不到子容器的租户组件。

use crate::registry::ComponentRegistry;
use async_trait::async_trait;
use dashmap::DashMap;
use di_abstractions::{
    ComponentAdapter, Interceptor, InterceptorContext, InterceptorKind,
    InterceptorOrdering, ResolutionSession, ResolvedComponent, Resolver, TenantsContext,
};
use infrastructure_common::{ComponentKey, ContainerError, ContainerResult, TypeKey};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// 多租户覆盖节点
pub struct TenancyContainer {
    context: InterceptorContext,
    tenants: Arc<dyn TenantsContext>,
}

impl TenancyContainer {
    /// 拦截器标识
    pub const ID: &'static str = "Tenancy";

    /// 创建节点
    pub fn new(context: InterceptorContext, tenants: Arc<dyn TenantsContext>) -> Self {
        Self { context, tenants }
    }

    /// 拦截器种类，位于管理导出节点之前
    ///
    /// `tenants` 为每个新建的容器创建租户上下文。
    pub fn kind<F>(tenants: F) -> InterceptorKind
    where
        F: Fn(&InterceptorContext) -> Arc<dyn TenantsContext> + Send + Sync + 'static,
    {
        InterceptorKind::new(
            InterceptorOrdering::new(Self::ID).runs_before(crate::ManageableContainer::ID),
            move |context| {
                let tenants = tenants(&context);
                Arc::new(TenancyContainer::new(context, tenants)) as Arc<dyn Interceptor>
            },
        )
    }

    fn resolve_overlay(
        &self,
        adapter: Arc<ComponentAdapter>,
        session: &ResolutionSession,
    ) -> ContainerResult<ResolvedComponent> {
        let holder = self.context.holder()?;
        let resolver = Resolver::new(holder, session);
        let instance = adapter.get_component_instance(&resolver)?;
        session.mark_uncacheable();
        Ok(ResolvedComponent::new(adapter, instance))
    }

    fn accepts_type(&self, ty: &TypeKey) -> bool {
        self.tenants.accept(&ComponentKey::Type(*ty))
    }

    fn overlay_for_type(&self, ty: &TypeKey) -> ContainerResult<Option<Arc<ComponentAdapter>>> {
        if !self.accepts_type(ty) {
            return Ok(None);
        }
        self.tenants.get_component_adapter_of_type(ty)
    }

    fn overlay_all_of_type(&self, ty: &TypeKey) -> Vec<Arc<ComponentAdapter>> {
        if !self.accepts_type(ty) {
            return Vec::new();
        }
        self.tenants.get_component_adapters_of_type(ty)
    }

    fn broken(&self) -> ContainerError {
        ContainerError::BrokenChain {
            interceptor: Self::ID.to_string(),
        }
    }
}

/// 按组件键合并，覆盖层条目替换同键条目，新条目追加在后
fn merge_by_key<T>(base: Vec<T>, overlay: Vec<T>, key: impl Fn(&T) -> &ComponentKey) -> Vec<T> {
    let mut merged = base;
    for entry in overlay {
        match merged.iter().position(|existing| key(existing) == key(&entry)) {
            Some(index) => merged[index] = entry,
            None => merged.push(entry),
        }
    }
    merged
}

#[async_trait]
impl Interceptor for TenancyContainer {
    fn id(&self) -> &str {
        Self::ID
    }

    fn successor(&self) -> Option<&Arc<dyn Interceptor>> {
        self.context.successor()
    }

    fn get_component_adapter(&self, key: &ComponentKey) -> Option<Arc<ComponentAdapter>> {
        if self.tenants.accept(key) {
            if let Some(adapter) = self.tenants.get_component_adapter(key) {
                return Some(adapter);
            }
        }
        self.successor()?.get_component_adapter(key)
    }

    fn get_component_adapter_of_type(
        &self,
        ty: &TypeKey,
    ) -> ContainerResult<Option<Arc<ComponentAdapter>>> {
        if let Some(adapter) = self.overlay_for_type(ty)? {
            return Ok(Some(adapter));
        }
        match self.successor() {
            Some(successor) => successor.get_component_adapter_of_type(ty),
            None => Ok(None),
        }
    }

    fn get_component_adapters_of_type(&self, ty: &TypeKey) -> Vec<Arc<ComponentAdapter>> {
        let base = self
            .successor()
            .map(|successor| successor.get_component_adapters_of_type(ty))
            .unwrap_or_default();
        let overlay = self.overlay_all_of_type(ty);
        merge_by_key(base, overlay, |adapter| adapter.key())
    }

    fn get_component_instance(
        &self,
        key: &ComponentKey,
        session: &ResolutionSession,
    ) -> ContainerResult<Option<ResolvedComponent>> {
        if self.tenants.accept(key) {
            if let Some(adapter) = self.tenants.get_component_adapter(key) {
                return self.resolve_overlay(adapter, session).map(Some);
            }
        }
        match self.successor() {
            Some(successor) => successor.get_component_instance(key, session),
            None => Ok(None),
        }
    }

    fn get_component_instance_of_type(
        &self,
        ty: &TypeKey,
        session: &ResolutionSession,
    ) -> ContainerResult<Option<ResolvedComponent>> {
        if let Some(adapter) = self.overlay_for_type(ty)? {
            return self.resolve_overlay(adapter, session).map(Some);
        }
        match self.successor() {
            Some(successor) => successor.get_component_instance_of_type(ty, session),
            None => Ok(None),
        }
    }

    fn get_component_instances_of_type(
        &self,
        ty: &TypeKey,
        session: &ResolutionSession,
    ) -> ContainerResult<Vec<ResolvedComponent>> {
        let base = match self.successor() {
            Some(successor) => successor.get_component_instances_of_type(ty, session)?,
            None => Vec::new(),
        };
        let overlay = self
            .overlay_all_of_type(ty)
            .into_iter()
            .map(|adapter| self.resolve_overlay(adapter, session))
            .collect::<ContainerResult<Vec<_>>>()?;
        Ok(merge_by_key(base, overlay, ResolvedComponent::key))
    }

    fn register_component(
        &self,
        adapter: Arc<ComponentAdapter>,
    ) -> ContainerResult<Arc<ComponentAdapter>> {
        if self.tenants.accept(adapter.key()) {
            if let Some(registered) = self.tenants.register_component(Arc::clone(&adapter))? {
                debug!(
                    "注册租户组件: {} -> {:?}",
                    registered.key(),
                    self.tenants.current_tenant()
                );
                return Ok(registered);
            }
        }
        match self.successor() {
            Some(successor) => successor.register_component(adapter),
            None => Err(self.broken()),
        }
    }

    fn unregister_component(&self, key: &ComponentKey) -> Option<Arc<ComponentAdapter>> {
        if self.tenants.accept(key) {
            if let Some(removed) = self.tenants.unregister_component(key) {
                return Some(removed);
            }
        }
        self.successor()?.unregister_component(key)
    }
}

type TenantResolver = Arc<dyn Fn() -> Option<String> + Send + Sync>;
type KeyPredicate = Arc<dyn Fn(&ComponentKey) -> bool + Send + Sync>;

/// 默认租户上下文
///
/// 每个租户一个独立注册表，当前租户由调用方提供的函数决定。
pub struct TenantRegistry {
    current: TenantResolver,
    predicate: KeyPredicate,
    tenants: DashMap<String, ComponentRegistry>,
}

impl TenantRegistry {
    /// 创建租户上下文
    pub fn new<C, P>(current: C, predicate: P) -> Self
    where
        C: Fn() -> Option<String> + Send + Sync + 'static,
        P: Fn(&ComponentKey) -> bool + Send + Sync + 'static,
    {
        Self {
            current: Arc::new(current),
            predicate: Arc::new(predicate),
            tenants: DashMap::new(),
        }
    }

    /// 按容器创建租户上下文的工厂，各容器共享租户判定与键判定
    pub fn per_container<C, P>(
        current: C,
        predicate: P,
    ) -> impl Fn(&InterceptorContext) -> Arc<dyn TenantsContext> + Send + Sync + 'static
    where
        C: Fn() -> Option<String> + Send + Sync + 'static,
        P: Fn(&ComponentKey) -> bool + Send + Sync + 'static,
    {
        let current: TenantResolver = Arc::new(current);
        let predicate: KeyPredicate = Arc::new(predicate);
        move |context| {
            debug!("创建租户上下文: {}", context.name());
            Arc::new(TenantRegistry {
                current: Arc::clone(&current),
                predicate: Arc::clone(&predicate),
                tenants: DashMap::new(),
            }) as Arc<dyn TenantsContext>
        }
    }

    /// 已有注册的租户
    pub fn tenants(&self) -> Vec<String> {
        self.tenants.iter().map(|entry| entry.key().clone()).collect()
    }

    fn with_current<R>(&self, f: impl FnOnce(&ComponentRegistry) -> R) -> Option<R> {
        let tenant = (self.current)()?;
        let registry = self.tenants.get(&tenant)?;
        Some(f(registry.value()))
    }
}

impl TenantsContext for TenantRegistry {
    fn current_tenant(&self) -> Option<String> {
        (self.current)()
    }

    fn accept(&self, key: &ComponentKey) -> bool {
        (self.predicate)(key)
    }

    fn get_component_adapter(&self, key: &ComponentKey) -> Option<Arc<ComponentAdapter>> {
        self.with_current(|registry| registry.lookup_by_key(key))
            .flatten()
    }

    fn get_component_adapter_of_type(
        &self,
        ty: &TypeKey,
    ) -> ContainerResult<Option<Arc<ComponentAdapter>>> {
        Ok(self
            .with_current(|registry| registry.lookup_by_type(ty))
            .transpose()?
            .flatten())
    }

    fn get_component_adapters_of_type(&self, ty: &TypeKey) -> Vec<Arc<ComponentAdapter>> {
        self.with_current(|registry| registry.lookup_all_by_type(ty))
            .unwrap_or_default()
    }

    fn register_component(
        &self,
        adapter: Arc<ComponentAdapter>,
    ) -> ContainerResult<Option<Arc<ComponentAdapter>>> {
        let Some(tenant) = (self.current)() else {
            return Ok(None);
        };
        let registry = self.tenants.entry(tenant).or_default();
        registry.register(adapter).map(Some)
    }

    fn unregister_component(&self, key: &ComponentKey) -> Option<Arc<ComponentAdapter>> {
        self.with_current(|registry| registry.unregister(key))
            .flatten()
    }
}

impl fmt::Debug for TenantRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantRegistry")
            .field("tenants", &self.tenants())
            .field("current", &"<function>")
            .field("predicate", &"<function>")
            .finish()
    }
}
