//! 缓存节点
//!
//! 惰性填充四张查找表，任何注册或注销都会整体清空。空结果从不缓存，
//! 之后的成功注册总能立即可见。

use async_trait::async_trait;
use dashmap::DashMap;
use di_abstractions::{
    ComponentAdapter, ContainerHandle, ContainerVisitor, Interceptor, InterceptorContext,
    InterceptorKind, InterceptorOrdering, ResolutionSession, ResolvedComponent,
};
use infrastructure_common::{ComponentKey, ContainerError, ContainerResult, TypeKey};
use std::sync::Arc;
use tracing::trace;

/// 缓存节点
pub struct CachingContainer {
    context: InterceptorContext,
    adapter_by_key: DashMap<ComponentKey, Arc<ComponentAdapter>>,
    adapter_by_type: DashMap<TypeKey, Arc<ComponentAdapter>>,
    adapters_by_type: DashMap<TypeKey, Vec<Arc<ComponentAdapter>>>,
    instances_by_type: DashMap<TypeKey, Vec<ResolvedComponent>>,
}

impl CachingContainer {
    /// 拦截器标识
    pub const ID: &'static str = "Cache";

    /// 创建节点
    pub fn new(context: InterceptorContext) -> Self {
        Self {
            context,
            adapter_by_key: DashMap::new(),
            adapter_by_type: DashMap::new(),
            adapters_by_type: DashMap::new(),
            instances_by_type: DashMap::new(),
        }
    }

    /// 拦截器种类
    pub fn kind() -> InterceptorKind {
        InterceptorKind::new(InterceptorOrdering::new(Self::ID), |context| {
            Arc::new(CachingContainer::new(context)) as Arc<dyn Interceptor>
        })
    }

    fn clear(&self) {
        self.adapter_by_key.clear();
        self.adapter_by_type.clear();
        self.adapters_by_type.clear();
        self.instances_by_type.clear();
    }

    /// 清空本容器及其子容器的缓存，子容器可能缓存了从这里借出的适配器
    fn invalidate_hierarchy(&self) {
        self.clear();
        if let Ok(holder) = self.context.holder() {
            if let Err(e) = holder.head().accept(&mut CacheInvalidator) {
                trace!("缓存失效遍历中断: {}", e);
            }
        }
    }

    fn successor_ref(&self) -> Option<&Arc<dyn Interceptor>> {
        self.context.successor()
    }
}

struct CacheInvalidator;

impl ContainerVisitor for CacheInvalidator {
    fn visit_container(&mut self, container: &Arc<dyn ContainerHandle>) -> ContainerResult<()> {
        container.head().invalidate_caches();
        Ok(())
    }
}

#[async_trait]
impl Interceptor for CachingContainer {
    fn id(&self) -> &str {
        Self::ID
    }

    fn successor(&self) -> Option<&Arc<dyn Interceptor>> {
        self.successor_ref()
    }

    fn get_component_adapter(&self, key: &ComponentKey) -> Option<Arc<ComponentAdapter>> {
        if let Some(cached) = self.adapter_by_key.get(key) {
            return Some(Arc::clone(cached.value()));
        }
        let adapter = self.successor_ref()?.get_component_adapter(key)?;
        self.adapter_by_key.insert(key.clone(), Arc::clone(&adapter));
        Some(adapter)
    }

    fn get_component_adapter_of_type(
        &self,
        ty: &TypeKey,
    ) -> ContainerResult<Option<Arc<ComponentAdapter>>> {
        if let Some(cached) = self.adapter_by_type.get(ty) {
            return Ok(Some(Arc::clone(cached.value())));
        }
        let Some(successor) = self.successor_ref() else {
            return Ok(None);
        };
        let adapter = successor.get_component_adapter_of_type(ty)?;
        if let Some(adapter) = &adapter {
            self.adapter_by_type.insert(*ty, Arc::clone(adapter));
        }
        Ok(adapter)
    }

    fn get_component_adapters_of_type(&self, ty: &TypeKey) -> Vec<Arc<ComponentAdapter>> {
        if let Some(cached) = self.adapters_by_type.get(ty) {
            return cached.value().clone();
        }
        let adapters = self
            .successor_ref()
            .map(|successor| successor.get_component_adapters_of_type(ty))
            .unwrap_or_default();
        if !adapters.is_empty() {
            self.adapters_by_type.insert(*ty, adapters.clone());
        }
        adapters
    }

    fn get_component_instances_of_type(
        &self,
        ty: &TypeKey,
        session: &ResolutionSession,
    ) -> ContainerResult<Vec<ResolvedComponent>> {
        if let Some(cached) = self.instances_by_type.get(ty) {
            return Ok(cached.value().clone());
        }
        let Some(successor) = self.successor_ref() else {
            return Ok(Vec::new());
        };

        let marks = session.uncacheable_marks();
        let instances = successor.get_component_instances_of_type(ty, session)?;
        if !instances.is_empty() && session.uncacheable_marks() == marks {
            self.instances_by_type.insert(*ty, instances.clone());
        }
        Ok(instances)
    }

    fn register_component(
        &self,
        adapter: Arc<ComponentAdapter>,
    ) -> ContainerResult<Arc<ComponentAdapter>> {
        self.clear();
        let result = match self.successor_ref() {
            Some(successor) => successor.register_component(adapter),
            None => Err(ContainerError::BrokenChain {
                interceptor: Self::ID.to_string(),
            }),
        };
        self.invalidate_hierarchy();
        result
    }

    fn unregister_component(&self, key: &ComponentKey) -> Option<Arc<ComponentAdapter>> {
        self.clear();
        let removed = self
            .successor_ref()
            .and_then(|successor| successor.unregister_component(key));
        self.invalidate_hierarchy();
        removed
    }

    fn invalidate_caches(&self) {
        self.clear();
        if let Some(successor) = self.successor_ref() {
            successor.invalidate_caches();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Container;
    use std::sync::Arc;

    trait Plugin: Send + Sync {
        fn name(&self) -> &str;
    }

    struct Named(&'static str);

    impl Plugin for Named {
        fn name(&self) -> &str {
            self.0
        }
    }

    fn register_plugin(container: &Container, key: &str, name: &'static str) {
        container
            .register_component_instance_with(key, Arc::new(Named(name)), |builder| {
                builder.provides::<dyn Plugin>(|c| c as Arc<dyn Plugin>)
            })
            .unwrap();
    }

    #[test]
    fn test_absent_lookup_is_not_memoized() {
        let container = Container::new("cache-absent");
        assert!(container
            .get_component_instance_of_type::<dyn Plugin>()
            .unwrap()
            .is_none());

        register_plugin(&container, "first", "first");
        let plugin = container
            .get_component_instance_of_type::<dyn Plugin>()
            .unwrap()
            .unwrap();
        assert_eq!(plugin.name(), "first");
    }

    #[test]
    fn test_mutation_invalidates_cached_lists() {
        let container = Container::new("cache-lists");
        register_plugin(&container, "first", "first");

        let names = |container: &Container| -> Vec<String> {
            container
                .get_component_instances_of_type::<dyn Plugin>()
                .unwrap()
                .iter()
                .map(|p| p.name().to_string())
                .collect()
        };
        assert_eq!(names(&container), vec!["first"]);
        assert_eq!(names(&container), vec!["first"]);

        register_plugin(&container, "second", "second");
        assert_eq!(names(&container).len(), 2);

        container.unregister_component("first");
        assert_eq!(names(&container), vec!["second"]);
        assert!(container
            .get_component_adapter_of_type::<dyn Plugin>()
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_parent_mutation_reaches_child_cache() {
        let parent = Container::new("cache-parent");
        let child = parent.child("cache-child").unwrap();

        assert!(child
            .get_component_adapter_of_type::<dyn Plugin>()
            .unwrap()
            .is_none());
        register_plugin(&parent, "shared", "shared");
        assert!(child
            .get_component_adapter_of_type::<dyn Plugin>()
            .unwrap()
            .is_some());

        parent.unregister_component("shared");
        assert!(child
            .get_component_adapter_of_type::<dyn Plugin>()
            .unwrap()
            .is_none());
    }
}
