//! 解析会话与解析器
//!
//! 每次顶层解析调用创建一个 [`ResolutionSession`]，记录正在构造中的组件。
//! 构造器执行期间组件键以“未完成”状态登记；构造器返回后实例被发布，
//! 插件对该组件的回查会拿到这个实例而不是再次进入构造。

use crate::adapter::{Instance, ResolvedComponent};
use crate::container::ContainerHandle;
use crate::factory::ComponentDefinition;
use infrastructure_common::{
    ComponentKey, ContainerError, ContainerResult, InitParams, TypeKey,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// 会话中某个组件键的状态
#[derive(Clone)]
pub enum SessionEntry {
    /// 未登记
    Absent,
    /// 构造器仍在执行
    InProgress,
    /// 实例已发布
    Ready(Instance),
}

/// 解析会话
///
/// 只属于发起解析的调用栈，不能跨线程共享。
#[derive(Default)]
pub struct ResolutionSession {
    entries: RefCell<HashMap<(Uuid, ComponentKey), Option<Instance>>>,
    uncacheable: Cell<usize>,
}

impl ResolutionSession {
    /// 创建新的解析会话
    pub fn new() -> Self {
        Self::default()
    }

    /// 查询组件键的状态，`scope` 为所属容器的标识
    pub fn lookup(&self, scope: Uuid, key: &ComponentKey) -> SessionEntry {
        match self.entries.borrow().get(&(scope, key.clone())) {
            None => SessionEntry::Absent,
            Some(None) => SessionEntry::InProgress,
            Some(Some(instance)) => SessionEntry::Ready(Arc::clone(instance)),
        }
    }

    /// 登记正在构造的组件，返回的守卫在离开作用域时移除登记
    pub fn enter(
        &self,
        scope: Uuid,
        key: &ComponentKey,
        max_depth: usize,
    ) -> ContainerResult<ConstructionGuard<'_>> {
        let mut entries = self.entries.borrow_mut();
        if entries.len() >= max_depth {
            return Err(ContainerError::ResolutionDepthExceeded {
                key: key.to_string(),
                max_depth,
            });
        }
        let entry = (scope, key.clone());
        entries.insert(entry.clone(), None);
        Ok(ConstructionGuard {
            session: self,
            entry,
        })
    }

    /// 当前正在构造的组件数量
    pub fn depth(&self) -> usize {
        self.entries.borrow().len()
    }

    /// 会话是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// 标记本次解析结果不可缓存
    pub fn mark_uncacheable(&self) {
        self.uncacheable.set(self.uncacheable.get() + 1);
    }

    /// 不可缓存标记计数
    pub fn uncacheable_marks(&self) -> usize {
        self.uncacheable.get()
    }
}

impl fmt::Debug for ResolutionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionSession")
            .field("depth", &self.depth())
            .field("uncacheable", &self.uncacheable.get())
            .finish()
    }
}

/// 构造守卫
pub struct ConstructionGuard<'a> {
    session: &'a ResolutionSession,
    entry: (Uuid, ComponentKey),
}

impl ConstructionGuard<'_> {
    /// 发布构造完成的实例
    pub fn publish(&self, instance: Instance) {
        if let Some(slot) = self.session.entries.borrow_mut().get_mut(&self.entry) {
            *slot = Some(instance);
        }
    }
}

impl Drop for ConstructionGuard<'_> {
    fn drop(&mut self) {
        self.session.entries.borrow_mut().remove(&self.entry);
    }
}

/// 解析器
///
/// 交给构造器插件使用的容器视图，所有查找都在同一个解析会话中进行。
pub struct Resolver<'a> {
    holder: Arc<dyn ContainerHandle>,
    session: &'a ResolutionSession,
}

impl<'a> Resolver<'a> {
    /// 创建解析器
    pub fn new(holder: Arc<dyn ContainerHandle>, session: &'a ResolutionSession) -> Self {
        Self { holder, session }
    }

    /// 解析会话
    pub fn session(&self) -> &'a ResolutionSession {
        self.session
    }

    /// 所属容器
    pub fn holder(&self) -> &Arc<dyn ContainerHandle> {
        &self.holder
    }

    /// 会话登记使用的容器标识
    pub fn scope(&self) -> Uuid {
        self.holder.id()
    }

    /// 最大解析深度
    pub fn max_depth(&self) -> usize {
        self.holder.config().max_resolution_depth
    }

    /// 按类型获取组件实例
    pub fn get_component_instance_of_type<T: ?Sized + 'static>(
        &self,
    ) -> ContainerResult<Option<Arc<T>>> {
        self.holder
            .head()
            .get_component_instance_of_type(&TypeKey::of::<T>(), self.session)?
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

    /// 按键获取组件实例
    pub fn get_component_instance<T: ?Sized + 'static>(
        &self,
        key: &ComponentKey,
    ) -> ContainerResult<Option<Arc<T>>> {
        self.holder
            .head()
            .get_component_instance(key, self.session)?
            .map(|resolved| resolved.cast::<T>())
            .transpose()
    }

    /// 获取所有可赋值给指定类型的组件实例
    pub fn get_component_instances_of_type<T: ?Sized + 'static>(
        &self,
    ) -> ContainerResult<Vec<Arc<T>>> {
        self.holder
            .head()
            .get_component_instances_of_type(&TypeKey::of::<T>(), self.session)?
            .iter()
            .map(ResolvedComponent::cast::<T>)
            .collect()
    }

    /// 通过容器创建组件实例
    pub fn create_component(
        &self,
        definition: &ComponentDefinition,
        params: &InitParams,
    ) -> ContainerResult<Instance> {
        self.holder
            .head()
            .create_component(definition, params, self.session)
    }
}

impl fmt::Debug for Resolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("container", &self.holder.name())
            .field("session", self.session)
            .finish()
    }
}
