//! 容器
//!
//! [`Container`] 是拦截器链的持有者。所有调用都从链头进入，链上的节点
//! 通过弱引用回到持有者，父容器同样以弱引用保存。

use crate::chain::DefaultInterceptorChainFactory;
use di_abstractions::{
    ChainShape, ComponentAdapter, ComponentDefinition, ContainerConfig, ContainerHandle,
    ContainerVisitor, InstanceAdapterBuilder, Interceptor, InterceptorChainFactory,
    InterceptorContext, ManagementContext, ResolutionSession, ResolvedComponent,
};
use infrastructure_common::{
    ComponentKey, ContainerError, ContainerResult, ContainerState, InitParams, TypeKey,
};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info};
use uuid::Uuid;

struct ContainerInner {
    id: Uuid,
    name: String,
    parent: Option<Weak<ContainerInner>>,
    head: Arc<dyn Interceptor>,
    config: ContainerConfig,
    chain_factory: Arc<dyn InterceptorChainFactory>,
    state: Mutex<ContainerState>,
    transition: tokio::sync::Mutex<()>,
}

impl ContainerHandle for ContainerInner {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn head(&self) -> Arc<dyn Interceptor> {
        Arc::clone(&self.head)
    }

    fn parent(&self) -> Option<Arc<dyn ContainerHandle>> {
        let parent = self.parent.as_ref()?.upgrade()?;
        Some(parent as Arc<dyn ContainerHandle>)
    }

    fn config(&self) -> &ContainerConfig {
        &self.config
    }
}

/// 容器构建器
pub struct ContainerBuilder {
    name: String,
    parent: Option<Container>,
    chain_factory: Option<Arc<dyn InterceptorChainFactory>>,
    config: Option<ContainerConfig>,
}

impl ContainerBuilder {
    /// 创建构建器
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            chain_factory: None,
            config: None,
        }
    }

    /// 设置父容器，未显式指定时沿用父容器的链工厂和配置
    ///
    /// 只设置父容器不会把新容器登记为父容器的逻辑子容器，需要生命周期和缓存
    /// 失效传递时使用 [`Container::child`]。
    pub fn parent(mut self, parent: &Container) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// 设置拦截器链工厂
    pub fn chain_factory(mut self, chain_factory: Arc<dyn InterceptorChainFactory>) -> Self {
        self.chain_factory = Some(chain_factory);
        self
    }

    /// 设置容器配置
    pub fn config(mut self, config: ContainerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 构建容器
    pub fn build(self) -> ContainerResult<Container> {
        let chain_factory = self.resolve_chain_factory();
        let shape = chain_factory.chain_shape()?;
        Ok(self.assemble(chain_factory, shape))
    }

    fn resolve_chain_factory(&self) -> Arc<dyn InterceptorChainFactory> {
        if let Some(chain_factory) = &self.chain_factory {
            return Arc::clone(chain_factory);
        }
        match &self.parent {
            Some(parent) => Arc::clone(&parent.inner.chain_factory),
            None => DefaultInterceptorChainFactory::global(),
        }
    }

    fn assemble(
        self,
        chain_factory: Arc<dyn InterceptorChainFactory>,
        shape: Arc<ChainShape>,
    ) -> Container {
        let config = self
            .config
            .or_else(|| self.parent.as_ref().map(|parent| parent.config().clone()))
            .unwrap_or_default();
        let parent = self.parent.as_ref().map(|parent| Arc::downgrade(&parent.inner));
        let name = self.name;

        let inner = Arc::new_cyclic(|weak: &Weak<ContainerInner>| {
            let holder: Weak<dyn ContainerHandle> = weak.clone();
            let parent_handle: Option<Weak<dyn ContainerHandle>> = parent
                .clone()
                .map(|parent| parent as Weak<dyn ContainerHandle>);
            let context = InterceptorContext::new(holder, parent_handle, name.clone(), config.clone());

            ContainerInner {
                id: Uuid::new_v4(),
                name,
                parent,
                head: shape.link(context),
                config,
                chain_factory,
                state: Mutex::new(ContainerState::Initialized),
                transition: tokio::sync::Mutex::new(()),
            }
        });

        debug!("创建容器: {} ({})", inner.name, inner.id);
        Container { inner }
    }
}

impl fmt::Debug for ContainerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(Container::name))
            .field("config", &self.config)
            .finish()
    }
}

/// 组件容器
///
/// 克隆得到的是同一个容器的另一个句柄。
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    /// 以默认拦截器链创建顶层容器
    pub fn new(name: impl Into<String>) -> Self {
        ContainerBuilder::new(name).assemble(
            DefaultInterceptorChainFactory::global(),
            DefaultInterceptorChainFactory::built_in_shape(),
        )
    }

    /// 创建构建器
    pub fn builder(name: impl Into<String>) -> ContainerBuilder {
        ContainerBuilder::new(name)
    }

    /// 创建子容器并登记为本容器的组件
    pub fn child(&self, name: impl Into<String>) -> ContainerResult<Container> {
        let name = name.into();
        let child = ContainerBuilder::new(name.clone()).parent(self).build()?;
        self.register_child(ComponentKey::named(name), &child)?;
        Ok(child)
    }

    /// 把另一个容器登记为本容器的逻辑子容器
    pub fn register_child(
        &self,
        key: impl Into<ComponentKey>,
        child: &Container,
    ) -> ContainerResult<Arc<ComponentAdapter>> {
        self.register_component_instance(key, Arc::new(child.clone()))
    }

    /// 容器标识
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// 容器名称
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// 容器配置
    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    /// 父容器
    pub fn parent(&self) -> Option<Container> {
        let inner = self.inner.parent.as_ref()?.upgrade()?;
        Some(Container { inner })
    }

    /// 当前状态
    pub fn state(&self) -> ContainerState {
        *self.inner.state.lock()
    }

    /// 类型擦除的容器句柄
    pub fn handle(&self) -> Arc<dyn ContainerHandle> {
        Arc::clone(&self.inner) as Arc<dyn ContainerHandle>
    }

    /// 拦截器链头
    pub fn head(&self) -> Arc<dyn Interceptor> {
        Arc::clone(&self.inner.head)
    }

    /// 拦截器标识，从内到外
    pub fn interceptor_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        let mut node = Some(self.head());
        while let Some(current) = node {
            ids.push(current.id().to_string());
            node = current.successor().cloned();
        }
        ids.reverse();
        ids
    }

    /// 注册适配器
    pub fn register_component(&self, adapter: ComponentAdapter) -> ContainerResult<Arc<ComponentAdapter>> {
        self.inner.head.register_component(Arc::new(adapter))
    }

    /// 注册已有实例
    pub fn register_component_instance<T: Send + Sync + 'static>(
        &self,
        key: impl Into<ComponentKey>,
        value: Arc<T>,
    ) -> ContainerResult<Arc<ComponentAdapter>> {
        self.register_component(ComponentAdapter::instance(key, value).build())
    }

    /// 注册已有实例，并通过 `configure` 声明它提供的类型
    pub fn register_component_instance_with<T, F>(
        &self,
        key: impl Into<ComponentKey>,
        value: Arc<T>,
        configure: F,
    ) -> ContainerResult<Arc<ComponentAdapter>>
    where
        T: Send + Sync + 'static,
        F: FnOnce(InstanceAdapterBuilder<T>) -> InstanceAdapterBuilder<T>,
    {
        self.register_component(configure(ComponentAdapter::instance(key, value)).build())
    }

    /// 以组件定义注册
    pub fn register_component_implementation(
        &self,
        key: impl Into<ComponentKey>,
        definition: Arc<ComponentDefinition>,
    ) -> ContainerResult<Arc<ComponentAdapter>> {
        self.register_component(ComponentAdapter::implementation(key, definition))
    }

    /// 以实现类型为键注册组件定义
    pub fn register_definition(
        &self,
        definition: ComponentDefinition,
    ) -> ContainerResult<Arc<ComponentAdapter>> {
        let key = ComponentKey::Type(definition.implementation());
        self.register_component_implementation(key, Arc::new(definition))
    }

    /// 注销组件
    pub fn unregister_component(&self, key: impl Into<ComponentKey>) -> Option<Arc<ComponentAdapter>> {
        self.inner.head.unregister_component(&key.into())
    }

    /// 按键获取适配器，本地未找到时查找父容器
    pub fn get_component_adapter(&self, key: impl Into<ComponentKey>) -> Option<Arc<ComponentAdapter>> {
        self.inner.head.get_component_adapter(&key.into())
    }

    /// 按类型获取唯一适配器
    pub fn get_component_adapter_of_type<T: ?Sized + 'static>(
        &self,
    ) -> ContainerResult<Option<Arc<ComponentAdapter>>> {
        self.inner
            .head
            .get_component_adapter_of_type(&TypeKey::of::<T>())
    }

    /// 本地所有可赋值给 `T` 的适配器
    pub fn get_component_adapters_of_type<T: ?Sized + 'static>(&self) -> Vec<Arc<ComponentAdapter>> {
        self.inner
            .head
            .get_component_adapters_of_type(&TypeKey::of::<T>())
    }

    /// 本地所有适配器，按注册顺序
    pub fn get_component_adapters(&self) -> Vec<Arc<ComponentAdapter>> {
        self.inner.head.get_component_adapters()
    }

    /// 本地已实例化组件的键，按实例化顺序
    pub fn instantiation_order(&self) -> Vec<ComponentKey> {
        self.inner
            .head
            .instantiation_order()
            .iter()
            .map(|adapter| adapter.key().clone())
            .collect()
    }

    /// 按键获取组件实例
    pub fn get_component_instance<T: ?Sized + 'static>(
        &self,
        key: impl Into<ComponentKey>,
    ) -> ContainerResult<Option<Arc<T>>> {
        let session = ResolutionSession::new();
        self.inner
            .head
            .get_component_instance(&key.into(), &session)?
            .map(|resolved| resolved.cast::<T>())
            .transpose()
    }

    /// 按类型获取组件实例，本地未找到时查找父容器
    pub fn get_component_instance_of_type<T: ?Sized + 'static>(
        &self,
    ) -> ContainerResult<Option<Arc<T>>> {
        let session = ResolutionSession::new();
        self.inner
            .head
            .get_component_instance_of_type(&TypeKey::of::<T>(), &session)?
            .map(|resolved| resolved.cast::<T>())
            .transpose()
    }

    /// 按类型获取必需的组件实例
    pub fn require<T: ?Sized + 'static>(&self) -> ContainerResult<Arc<T>> {
        self.get_component_instance_of_type::<T>()?
            .ok_or_else(|| ContainerError::ComponentNotFound {
                type_name: std::any::type_name::<T>().to_string(),
            })
    }

    /// 本地所有可赋值给 `T` 的组件实例，按实例化顺序
    pub fn get_component_instances_of_type<T: ?Sized + 'static>(&self) -> ContainerResult<Vec<Arc<T>>> {
        let session = ResolutionSession::new();
        self.inner
            .head
            .get_component_instances_of_type(&TypeKey::of::<T>(), &session)?
            .iter()
            .map(ResolvedComponent::cast::<T>)
            .collect()
    }

    /// 通过构造器创建一个不注册的组件实例
    pub fn create_component<T: Send + Sync + 'static>(
        &self,
        definition: &ComponentDefinition,
        params: &InitParams,
    ) -> ContainerResult<Arc<T>> {
        let session = ResolutionSession::new();
        let instance = self
            .inner
            .head
            .create_component(definition, params, &session)?;
        instance
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                key: definition.implementation().to_string(),
                expected: std::any::type_name::<T>().to_string(),
                implementation: definition.implementation().name().to_string(),
            })
    }

    /// 接受访问者
    pub fn accept(&self, visitor: &mut dyn ContainerVisitor) -> ContainerResult<()> {
        self.inner.head.accept(visitor)
    }

    /// 清空查找缓存
    pub fn invalidate_caches(&self) {
        self.inner.head.invalidate_caches();
    }

    /// 管理上下文
    pub fn management_context(&self) -> Option<Arc<ManagementContext>> {
        self.inner.head.management_context()
    }

    /// 管理对象作用域名称
    pub fn scoping_object_name(&self) -> Option<String> {
        self.inner.head.scoping_object_name()
    }

    /// 启动容器，已启动时什么也不做
    ///
    /// 启动、停止与销毁互斥执行，并发调用依次看到前一次调用完成后的状态。
    pub async fn start(&self) -> ContainerResult<()> {
        let _transition = self.inner.transition.lock().await;
        match self.state() {
            ContainerState::Disposed => return Err(self.disposed()),
            ContainerState::Started => return Ok(()),
            ContainerState::Initialized | ContainerState::Stopped => {}
        }

        info!("启动容器: {}", self.name());
        self.inner.head.start().await?;
        self.set_state(ContainerState::Started);
        Ok(())
    }

    /// 停止容器，未启动时什么也不做
    pub async fn stop(&self) -> ContainerResult<()> {
        let _transition = self.inner.transition.lock().await;
        match self.state() {
            ContainerState::Disposed => Err(self.disposed()),
            ContainerState::Started => {
                self.stop_started().await;
                Ok(())
            }
            ContainerState::Initialized | ContainerState::Stopped => Ok(()),
        }
    }

    /// 销毁容器，已启动时先停止；重复销毁什么也不做
    pub async fn dispose(&self) -> ContainerResult<()> {
        let _transition = self.inner.transition.lock().await;
        match self.state() {
            ContainerState::Disposed => {
                debug!("容器已销毁: {}", self.name());
                return Ok(());
            }
            ContainerState::Started => self.stop_started().await,
            ContainerState::Initialized | ContainerState::Stopped => {}
        }

        info!("销毁容器: {}", self.name());
        self.inner.head.dispose().await;
        self.set_state(ContainerState::Disposed);
        Ok(())
    }

    /// 调用方持有状态转换锁
    async fn stop_started(&self) {
        info!("停止容器: {}", self.name());
        self.inner.head.stop().await;
        self.set_state(ContainerState::Stopped);
    }

    fn set_state(&self, state: ContainerState) {
        *self.inner.state.lock() = state;
    }

    fn disposed(&self) -> ContainerError {
        ContainerError::Disposed {
            container: self.name().to_string(),
        }
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Container {}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .field("parent", &self.parent().map(|parent| parent.name().to_string()))
            .finish()
    }
}
