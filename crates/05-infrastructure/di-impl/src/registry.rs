//! 组件注册表

use crate::container::Container;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use di_abstractions::{ComponentAdapter, ResolvedComponent};
use infrastructure_common::{ComponentKey, ContainerError, ContainerResult, TypeKey};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// 组件注册表
///
/// 每个容器一个。键到适配器的映射保证唯一；实例化顺序只在适配器第一次
/// 真正产生实例时追加，是生命周期顺序的唯一依据。
#[derive(Default)]
pub struct ComponentRegistry {
    adapters_by_key: DashMap<ComponentKey, Arc<ComponentAdapter>>,
    adapters: RwLock<Vec<Arc<ComponentAdapter>>>,
    instantiation_order: RwLock<Vec<Arc<ComponentAdapter>>>,
    children: RwLock<Vec<Container>>,
}

impl ComponentRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册适配器，键已存在时失败且不覆盖
    pub fn register(&self, adapter: Arc<ComponentAdapter>) -> ContainerResult<Arc<ComponentAdapter>> {
        match self.adapters_by_key.entry(adapter.key().clone()) {
            Entry::Occupied(_) => Err(ContainerError::DuplicateKey {
                key: adapter.key().to_string(),
            }),
            Entry::Vacant(slot) => {
                self.adapters.write().push(Arc::clone(&adapter));
                slot.insert(Arc::clone(&adapter));
                Ok(adapter)
            }
        }
    }

    /// 注销适配器，同时从实例化顺序和子容器集合中移除
    pub fn unregister(&self, key: &ComponentKey) -> Option<Arc<ComponentAdapter>> {
        let (_, removed) = self.adapters_by_key.remove(key)?;
        self.adapters
            .write()
            .retain(|adapter| !Arc::ptr_eq(adapter, &removed));
        self.instantiation_order
            .write()
            .retain(|adapter| !Arc::ptr_eq(adapter, &removed));

        if let Some(child) = nested_container(&removed) {
            self.children.write().retain(|existing| *existing != child);
        }
        Some(removed)
    }

    /// 按键查找，只查本地
    pub fn lookup_by_key(&self, key: &ComponentKey) -> Option<Arc<ComponentAdapter>> {
        self.adapters_by_key
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// 按类型查找唯一适配器
    ///
    /// 先看键恰好为该类型的适配器，再扫描所有可赋值的适配器；多于一个时失败。
    pub fn lookup_by_type(&self, ty: &TypeKey) -> ContainerResult<Option<Arc<ComponentAdapter>>> {
        if let Some(exact) = self.lookup_by_key(&ComponentKey::Type(*ty)) {
            if exact.provides(ty) {
                return Ok(Some(exact));
            }
        }

        let mut candidates = self.lookup_all_by_type(ty);
        match candidates.len() {
            0 => Ok(None),
            1 => Ok(candidates.pop()),
            _ => Err(ContainerError::AmbiguousType {
                requested: ty.name().to_string(),
                candidates: candidates
                    .iter()
                    .map(|adapter| adapter.implementation_type().name().to_string())
                    .collect(),
            }),
        }
    }

    /// 所有可赋值给指定类型的本地适配器
    pub fn lookup_all_by_type(&self, ty: &TypeKey) -> Vec<Arc<ComponentAdapter>> {
        self.adapters
            .read()
            .iter()
            .filter(|adapter| adapter.provides(ty))
            .cloned()
            .collect()
    }

    /// 所有适配器，按注册顺序
    pub fn adapters(&self) -> Vec<Arc<ComponentAdapter>> {
        self.adapters.read().clone()
    }

    /// 实例化顺序快照
    pub fn instantiation_order(&self) -> Vec<Arc<ComponentAdapter>> {
        self.instantiation_order.read().clone()
    }

    /// 记录首次实例化，已记录或已注销的适配器返回 `false`
    pub fn add_ordered(&self, adapter: &Arc<ComponentAdapter>) -> bool {
        let mut order = self.instantiation_order.write();
        if !self.contains(adapter) || order.iter().any(|existing| Arc::ptr_eq(existing, adapter)) {
            return false;
        }
        order.push(Arc::clone(adapter));
        true
    }

    /// 适配器是否属于本注册表
    pub fn contains(&self, adapter: &Arc<ComponentAdapter>) -> bool {
        self.adapters_by_key
            .get(adapter.key())
            .map(|entry| Arc::ptr_eq(entry.value(), adapter))
            .unwrap_or(false)
    }

    /// 适配器在实例化顺序中的位置
    pub fn order_position(&self, adapter: &Arc<ComponentAdapter>) -> Option<usize> {
        self.instantiation_order
            .read()
            .iter()
            .position(|existing| Arc::ptr_eq(existing, adapter))
    }

    /// 逻辑子容器
    pub fn children(&self) -> Vec<Container> {
        self.children.read().clone()
    }

    /// 添加逻辑子容器
    pub fn add_child(&self, child: Container) {
        let mut children = self.children.write();
        if !children.contains(&child) {
            children.push(child);
        }
    }

    /// 已存在的、可赋值给指定类型的实例
    ///
    /// 按实例化顺序排列；以实例注册但尚未被解析过的组件追加在最后。
    pub fn instances_in_order(&self, ty: &TypeKey) -> Vec<ResolvedComponent> {
        let mut resolved: Vec<ResolvedComponent> = self
            .instantiation_order()
            .into_iter()
            .filter(|adapter| adapter.provides(ty))
            .filter_map(|adapter| {
                let instance = adapter.existing_instance().cloned()?;
                Some(ResolvedComponent::new(adapter, instance))
            })
            .collect();

        for adapter in self.lookup_all_by_type(ty) {
            if resolved
                .iter()
                .any(|existing| Arc::ptr_eq(existing.adapter(), &adapter))
            {
                continue;
            }
            if let Some(instance) = adapter.existing_instance().cloned() {
                resolved.push(ResolvedComponent::new(adapter, instance));
            }
        }
        resolved
    }

    /// 适配器数量
    pub fn len(&self) -> usize {
        self.adapters_by_key.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.adapters_by_key.is_empty()
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("adapters", &self.adapters.read().len())
            .field("instantiated", &self.instantiation_order.read().len())
            .field("children", &self.children.read().len())
            .finish()
    }
}

/// 适配器持有的嵌套容器
pub(crate) fn nested_container(adapter: &ComponentAdapter) -> Option<Container> {
    if !adapter.is_instance() {
        return None;
    }
    let instance = adapter.existing_instance()?;
    Arc::clone(instance)
        .downcast::<Container>()
        .ok()
        .map(|container| (*container).clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    trait Shape: Send + Sync {}

    struct Circle;
    impl Shape for Circle {}

    struct Square;
    impl Shape for Square {}

    fn shape_adapter<T: Shape + 'static>(key: &str, value: T) -> Arc<ComponentAdapter> {
        Arc::new(
            ComponentAdapter::instance(key, Arc::new(value))
                .provides::<dyn Shape>(|c| c as Arc<dyn Shape>)
                .build(),
        )
    }

    #[test]
    fn test_duplicate_key_is_rejected() {
        let registry = ComponentRegistry::new();
        let first = Arc::new(ComponentAdapter::instance("svc", Arc::new(1_u32)).build());
        let second = Arc::new(ComponentAdapter::instance("svc", Arc::new(2_u32)).build());

        registry.register(Arc::clone(&first)).unwrap();
        assert!(matches!(
            registry.register(second),
            Err(ContainerError::DuplicateKey { .. })
        ));

        let found = registry.lookup_by_key(&ComponentKey::named("svc")).unwrap();
        assert!(Arc::ptr_eq(&found, &first));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ambiguous_type_until_one_removed() {
        let registry = ComponentRegistry::new();
        registry.register(shape_adapter("circle", Circle)).unwrap();
        registry.register(shape_adapter("square", Square)).unwrap();

        let shape = TypeKey::of::<dyn Shape>();
        match registry.lookup_by_type(&shape) {
            Err(ContainerError::AmbiguousType { candidates, .. }) => assert_eq!(candidates.len(), 2),
            other => panic!("应为歧义错误: {:?}", other.map(|_| ())),
        }

        registry.unregister(&ComponentKey::named("circle"));
        let remaining = registry.lookup_by_type(&shape).unwrap().unwrap();
        assert_eq!(remaining.key(), &ComponentKey::named("square"));
    }

    #[test]
    fn test_exact_type_key_wins_over_scan() {
        let registry = ComponentRegistry::new();
        registry
            .register(Arc::new(
                ComponentAdapter::instance(ComponentKey::of::<Circle>(), Arc::new(Circle)).build(),
            ))
            .unwrap();
        registry
            .register(Arc::new(ComponentAdapter::instance("other", Arc::new(Circle)).build()))
            .unwrap();

        let found = registry
            .lookup_by_type(&TypeKey::of::<Circle>())
            .unwrap()
            .unwrap();
        assert_eq!(found.key(), &ComponentKey::of::<Circle>());
    }

    #[test]
    fn test_instantiation_order_tracks_membership() {
        let registry = ComponentRegistry::new();
        let adapter = registry
            .register(Arc::new(ComponentAdapter::instance("a", Arc::new(1_u8)).build()))
            .unwrap();
        let stranger = Arc::new(ComponentAdapter::instance("b", Arc::new(2_u8)).build());

        assert!(registry.add_ordered(&adapter));
        assert!(!registry.add_ordered(&adapter));
        assert!(!registry.add_ordered(&stranger));
        assert_eq!(registry.order_position(&adapter), Some(0));

        registry.unregister(adapter.key());
        assert!(registry.instantiation_order().is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_register_has_single_winner() {
        let registry = ComponentRegistry::new();
        let barrier = Barrier::new(8);

        let wins: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8_u32)
                .map(|i| {
                    let registry = &registry;
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        let adapter = Arc::new(ComponentAdapter::instance("svc", Arc::new(i)).build());
                        registry.register(adapter).is_ok() as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(wins, 1);
        assert_eq!(registry.adapters().len(), 1);
    }
}
