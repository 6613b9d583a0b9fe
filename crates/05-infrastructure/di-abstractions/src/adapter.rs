//! 组件适配器
//!
//! 适配器是注册的基本单元：组件键、实现类型，以及产生实例的策略
//! （已有实例，或通过构造器创建）。

use crate::factory::{ComponentDefinition, ComponentPlugin};
use crate::resolver::Resolver;
use infrastructure_common::{
    ComponentKey, ContainerError, ContainerResult, Disposable, InitParams, Startable, TypeKey,
};
use once_cell::sync::OnceCell;
use parking_lot::ReentrantMutex;
use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

/// 类型擦除后的组件实例
pub type Instance = Arc<dyn Any + Send + Sync>;

/// 类型擦除后的依赖值，内部是 `Arc<I>`
pub type ErasedArc = Box<dyn Any + Send + Sync>;

type CastFn = Arc<dyn Fn(&Instance) -> Option<ErasedArc> + Send + Sync>;

#[derive(Clone)]
struct ProvidedType {
    ty: TypeKey,
    cast: CastFn,
}

/// 组件对外提供的类型集合
///
/// 类型查找时，组件只有在提供了请求的类型时才被视为可赋值。
#[derive(Clone, Default)]
pub struct ProvidedTypes {
    types: Vec<ProvidedType>,
}

impl ProvidedTypes {
    /// 以实现类型本身创建
    pub fn of<T: Send + Sync + 'static>() -> Self {
        let mut provided = Self::default();
        provided.add::<T, T, _>(|component| component);
        provided
    }

    /// 添加提供的类型，`convert` 负责从实现类型转换到目标类型
    pub fn add<T, I, F>(&mut self, convert: F)
    where
        T: Send + Sync + 'static,
        I: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    {
        let ty = TypeKey::of::<I>();
        if self.contains(&ty) {
            return;
        }
        let cast: CastFn = Arc::new(move |instance: &Instance| {
            let concrete = Arc::clone(instance).downcast::<T>().ok()?;
            Some(Box::new(convert(concrete)) as ErasedArc)
        });
        self.types.push(ProvidedType { ty, cast });
    }

    /// 是否提供指定类型
    pub fn contains(&self, ty: &TypeKey) -> bool {
        self.types.iter().any(|provided| provided.ty == *ty)
    }

    /// 所有提供的类型
    pub fn types(&self) -> impl Iterator<Item = &TypeKey> {
        self.types.iter().map(|provided| &provided.ty)
    }

    fn cast_erased(&self, ty: &TypeKey, instance: &Instance) -> Option<ErasedArc> {
        let provided = self.types.iter().find(|provided| provided.ty == *ty)?;
        (provided.cast)(instance)
    }

    fn cast<T: ?Sized + 'static>(&self, instance: &Instance) -> Option<Arc<T>> {
        let erased = self.cast_erased(&TypeKey::of::<T>(), instance)?;
        erased.downcast::<Arc<T>>().ok().map(|boxed| *boxed)
    }
}

impl fmt::Debug for ProvidedTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.types.iter().map(|provided| provided.ty.name()))
            .finish()
    }
}

/// 实例产生策略
#[derive(Clone)]
pub enum AdapterStrategy {
    /// 注册时已给定实例
    Instance,
    /// 通过组件定义的构造器创建
    Implementation {
        definition: Arc<ComponentDefinition>,
        params: InitParams,
        plugins: Vec<ComponentPlugin>,
    },
}

/// 组件适配器
///
/// 注册后除了自身的单实例缓存以外不可变。
pub struct ComponentAdapter {
    key: ComponentKey,
    implementation: TypeKey,
    provides: ProvidedTypes,
    strategy: AdapterStrategy,
    singleton: bool,
    instance: OnceCell<Instance>,
    creating: ReentrantMutex<Cell<bool>>,
}

impl ComponentAdapter {
    /// 以已有实例创建适配器
    pub fn instance<T: Send + Sync + 'static>(
        key: impl Into<ComponentKey>,
        value: Arc<T>,
    ) -> InstanceAdapterBuilder<T> {
        InstanceAdapterBuilder {
            key: key.into(),
            value,
            provides: ProvidedTypes::of::<T>(),
        }
    }

    /// 以组件定义创建适配器
    pub fn implementation(key: impl Into<ComponentKey>, definition: Arc<ComponentDefinition>) -> Self {
        Self {
            key: key.into(),
            implementation: definition.implementation(),
            provides: definition.provides().clone(),
            strategy: AdapterStrategy::Implementation {
                definition,
                params: InitParams::new(),
                plugins: Vec::new(),
            },
            singleton: true,
            instance: OnceCell::new(),
            creating: ReentrantMutex::new(Cell::new(false)),
        }
    }

    /// 设置初始化参数
    pub fn with_init_params(mut self, init_params: InitParams) -> Self {
        if let AdapterStrategy::Implementation { params, .. } = &mut self.strategy {
            *params = init_params;
        }
        self
    }

    /// 附加外部插件
    pub fn with_plugin(mut self, plugin: ComponentPlugin) -> Self {
        if let AdapterStrategy::Implementation { plugins, .. } = &mut self.strategy {
            plugins.push(plugin);
        }
        self
    }

    /// 每次解析都创建新实例
    pub fn prototype(mut self) -> Self {
        if matches!(self.strategy, AdapterStrategy::Implementation { .. }) {
            self.singleton = false;
        }
        self
    }

    /// 组件键
    pub fn key(&self) -> &ComponentKey {
        &self.key
    }

    /// 实现类型
    pub fn implementation_type(&self) -> TypeKey {
        self.implementation
    }

    /// 是否为单例
    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    /// 是否以已有实例注册
    pub fn is_instance(&self) -> bool {
        matches!(self.strategy, AdapterStrategy::Instance)
    }

    /// 实例产生策略
    pub fn strategy(&self) -> &AdapterStrategy {
        &self.strategy
    }

    /// 是否可赋值给指定类型
    pub fn provides(&self, ty: &TypeKey) -> bool {
        self.provides.contains(ty)
    }

    /// 提供的类型集合
    pub fn provided_types(&self) -> &ProvidedTypes {
        &self.provides
    }

    /// 已经存在的实例，不触发创建
    pub fn existing_instance(&self) -> Option<&Instance> {
        self.instance.get()
    }

    /// 将实例转换为指定类型
    pub fn cast<T: ?Sized + 'static>(&self, instance: &Instance) -> ContainerResult<Arc<T>> {
        self.provides
            .cast::<T>(instance)
            .ok_or_else(|| ContainerError::TypeMismatch {
                key: self.key.to_string(),
                expected: std::any::type_name::<T>().to_string(),
                implementation: self.implementation.name().to_string(),
            })
    }

    /// 将实例转换为指定类型键对应的擦除值
    pub fn cast_erased(&self, ty: &TypeKey, instance: &Instance) -> ContainerResult<ErasedArc> {
        self.provides
            .cast_erased(ty, instance)
            .ok_or_else(|| ContainerError::TypeMismatch {
                key: self.key.to_string(),
                expected: ty.name().to_string(),
                implementation: self.implementation.name().to_string(),
            })
    }

    /// 获取组件实例，单例只创建一次
    pub fn get_component_instance(&self, resolver: &Resolver<'_>) -> ContainerResult<Instance> {
        if let Some(instance) = self.instance.get() {
            return Ok(Arc::clone(instance));
        }
        let AdapterStrategy::Implementation {
            definition,
            params,
            plugins,
        } = &self.strategy
        else {
            return Err(ContainerError::ComponentNotFound {
                type_name: self.implementation.name().to_string(),
            });
        };

        if !self.singleton {
            return self.create(definition, params, plugins, resolver);
        }

        let creating = self.creating.lock();
        if let Some(instance) = self.instance.get() {
            return Ok(Arc::clone(instance));
        }
        if creating.get() {
            return Err(ContainerError::CyclicDependency {
                key: self.key.to_string(),
            });
        }
        creating.set(true);
        let created = self.create(definition, params, plugins, resolver);
        creating.set(false);

        let instance = created?;
        Ok(Arc::clone(self.instance.get_or_init(|| instance)))
    }

    fn create(
        &self,
        definition: &ComponentDefinition,
        params: &InitParams,
        plugins: &[ComponentPlugin],
        resolver: &Resolver<'_>,
    ) -> ContainerResult<Instance> {
        let construction =
            resolver
                .session()
                .enter(resolver.scope(), &self.key, resolver.max_depth())?;

        debug!("创建组件: {} ({})", self.key, self.implementation.short_name());
        let instance = resolver.create_component(definition, params)?;
        construction.publish(Arc::clone(&instance));

        for plugin in definition.plugins().iter().chain(plugins) {
            debug!("应用组件插件: {} -> {}", plugin.name(), self.key);
            if let Err(e) = plugin.apply(&instance, resolver) {
                error!(
                    "组件插件执行失败: {} -> {}, 原因: {:#}",
                    plugin.name(),
                    self.key,
                    e
                );
            }
        }

        Ok(instance)
    }
}

impl fmt::Debug for ComponentAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentAdapter")
            .field("key", &self.key)
            .field("implementation", &self.implementation.name())
            .field("provides", &self.provides)
            .field("singleton", &self.singleton)
            .field("instance", &self.instance.get().map(|_| "<instance>"))
            .finish()
    }
}

/// 已有实例的适配器构建器
pub struct InstanceAdapterBuilder<T> {
    key: ComponentKey,
    value: Arc<T>,
    provides: ProvidedTypes,
}

impl<T: Send + Sync + 'static> InstanceAdapterBuilder<T> {
    /// 声明实例可作为类型 `I` 解析
    pub fn provides<I>(mut self, convert: impl Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.provides.add::<T, I, _>(convert);
        self
    }

    /// 声明实例参与启动和停止
    pub fn startable(self) -> Self
    where
        T: Startable,
    {
        self.provides::<dyn Startable>(|component| component as Arc<dyn Startable>)
    }

    /// 声明实例参与销毁
    pub fn disposable(self) -> Self
    where
        T: Disposable,
    {
        self.provides::<dyn Disposable>(|component| component as Arc<dyn Disposable>)
    }

    /// 构建适配器
    pub fn build(self) -> ComponentAdapter {
        let instance = OnceCell::new();
        let _ = instance.set(self.value as Instance);
        ComponentAdapter {
            key: self.key,
            implementation: TypeKey::of::<T>(),
            provides: self.provides,
            strategy: AdapterStrategy::Instance,
            singleton: true,
            instance,
            creating: ReentrantMutex::new(Cell::new(false)),
        }
    }
}

/// 已解析的组件：适配器与其实例
#[derive(Clone)]
pub struct ResolvedComponent {
    adapter: Arc<ComponentAdapter>,
    instance: Instance,
}

impl ResolvedComponent {
    /// 创建已解析组件
    pub fn new(adapter: Arc<ComponentAdapter>, instance: Instance) -> Self {
        Self { adapter, instance }
    }

    /// 组件适配器
    pub fn adapter(&self) -> &Arc<ComponentAdapter> {
        &self.adapter
    }

    /// 组件键
    pub fn key(&self) -> &ComponentKey {
        self.adapter.key()
    }

    /// 类型擦除的实例
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// 转换为指定类型
    pub fn cast<T: ?Sized + 'static>(&self) -> ContainerResult<Arc<T>> {
        self.adapter.cast::<T>(&self.instance)
    }

    /// 转换为指定类型键对应的擦除值
    pub fn cast_erased(&self, ty: &TypeKey) -> ContainerResult<ErasedArc> {
        self.adapter.cast_erased(ty, &self.instance)
    }
}

impl fmt::Debug for ResolvedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedComponent")
            .field("key", self.adapter.key())
            .field("implementation", &self.adapter.implementation_type().name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    #[async_trait]
    impl Startable for English {}

    #[test]
    fn test_instance_adapter_casts_to_provided_types() {
        let adapter = ComponentAdapter::instance("greeter", Arc::new(English))
            .provides::<dyn Greeter>(|c| c as Arc<dyn Greeter>)
            .startable()
            .build();

        assert!(adapter.is_instance());
        assert!(adapter.provides(&TypeKey::of::<English>()));
        assert!(adapter.provides(&TypeKey::of::<dyn Greeter>()));
        assert!(adapter.provides(&TypeKey::of::<dyn Startable>()));
        assert!(!adapter.provides(&TypeKey::of::<String>()));

        let instance = adapter.existing_instance().cloned().unwrap();
        let greeter = adapter.cast::<dyn Greeter>(&instance).unwrap();
        assert_eq!(greeter.greet(), "hello");

        let concrete = adapter.cast::<English>(&instance).unwrap();
        assert!(Arc::ptr_eq(&concrete, &adapter.cast::<English>(&instance).unwrap()));
    }

    #[test]
    fn test_cast_to_unprovided_type_is_mismatch() {
        let adapter = ComponentAdapter::instance("value", Arc::new(42_u32)).build();
        let instance = adapter.existing_instance().cloned().unwrap();

        assert!(matches!(
            adapter.cast::<String>(&instance),
            Err(ContainerError::TypeMismatch { .. })
        ));
        assert_eq!(*adapter.cast::<u32>(&instance).unwrap(), 42);
    }

    #[test]
    fn test_prototype_only_applies_to_implementations() {
        let adapter = ComponentAdapter::instance("value", Arc::new(1_u8))
            .build()
            .prototype();
        assert!(adapter.is_singleton());
    }
}
