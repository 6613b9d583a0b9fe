//! 多租户覆盖层抽象

use crate::adapter::ComponentAdapter;
use infrastructure_common::{ComponentKey, ContainerResult, TypeKey};
use std::sync::Arc;

/// 租户上下文 trait
///
/// 查找时先于普通注册表被询问；键被接受的注册直接进入覆盖层。
pub trait TenantsContext: Send + Sync {
    /// 当前租户名称
    fn current_tenant(&self) -> Option<String>;

    /// 是否由覆盖层处理该键
    fn accept(&self, key: &ComponentKey) -> bool;

    /// 当前租户下按键查找适配器
    fn get_component_adapter(&self, key: &ComponentKey) -> Option<Arc<ComponentAdapter>>;

    /// 当前租户下按类型查找唯一适配器
    fn get_component_adapter_of_type(
        &self,
        ty: &TypeKey,
    ) -> ContainerResult<Option<Arc<ComponentAdapter>>>;

    /// 当前租户下所有可赋值给指定类型的适配器
    fn get_component_adapters_of_type(&self, ty: &TypeKey) -> Vec<Arc<ComponentAdapter>>;

    /// 在当前租户下注册，没有活动租户时返回 `None`，由普通注册表处理
    fn register_component(
        &self,
        adapter: Arc<ComponentAdapter>,
    ) -> ContainerResult<Option<Arc<ComponentAdapter>>>;

    /// 在当前租户下注销
    fn unregister_component(&self, key: &ComponentKey) -> Option<Arc<ComponentAdapter>>;
}
