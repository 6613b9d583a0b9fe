//! 管理导出
//!
//! 每个容器有一个管理上下文，与父容器的上下文相连。组件变为外部可见或被移除时，
//! 上下文调用所有导出器（本容器及祖先容器注册的）进行导出或撤销。

use crate::adapter::Instance;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use infrastructure_common::{BoxError, ComponentKey, TypeKey};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// 管理对象名称的域
pub const MANAGEMENT_DOMAIN: &str = "kernel";

/// 被管理的资源
#[derive(Clone)]
pub struct ManagedResource {
    key: ComponentKey,
    object_name: String,
    implementation: TypeKey,
    instance: Instance,
    registered_at: DateTime<Utc>,
}

impl ManagedResource {
    /// 组件键
    pub fn key(&self) -> &ComponentKey {
        &self.key
    }

    /// 管理对象名称
    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    /// 实现类型
    pub fn implementation(&self) -> TypeKey {
        self.implementation
    }

    /// 组件实例
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// 导出时间
    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }
}

impl fmt::Debug for ManagedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedResource")
            .field("key", &self.key)
            .field("object_name", &self.object_name)
            .field("implementation", &self.implementation.name())
            .field("registered_at", &self.registered_at)
            .finish()
    }
}

/// 管理导出器 trait
///
/// 具体的导出格式由实现决定，容器只负责在合适的时机调用。
pub trait ManagementExporter: Send + Sync {
    /// 导出器名称
    fn name(&self) -> &str;

    /// 导出资源
    fn export(&self, resource: &ManagedResource) -> Result<(), BoxError>;

    /// 撤销导出
    fn unexport(&self, resource: &ManagedResource) -> Result<(), BoxError>;
}

/// 管理上下文
pub struct ManagementContext {
    parent: Option<Arc<ManagementContext>>,
    scoping: (String, String),
    exporters: RwLock<Vec<Arc<dyn ManagementExporter>>>,
    resources: DashMap<ComponentKey, ManagedResource>,
    object_name: OnceCell<String>,
}

impl ManagementContext {
    /// 创建管理上下文，`scoping` 为本容器在对象名称中的属性
    pub fn new(
        parent: Option<Arc<ManagementContext>>,
        property: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            parent,
            scoping: (property.into(), value.into()),
            exporters: RwLock::new(Vec::new()),
            resources: DashMap::new(),
            object_name: OnceCell::new(),
        }
    }

    /// 父上下文
    pub fn parent(&self) -> Option<&Arc<ManagementContext>> {
        self.parent.as_ref()
    }

    /// 作用域属性，祖先在前
    pub fn scoping_properties(&self) -> Vec<(String, String)> {
        let mut properties = self
            .parent
            .as_ref()
            .map(|parent| parent.scoping_properties())
            .unwrap_or_default();
        properties.push(self.scoping.clone());
        properties
    }

    /// 作用域对象名称，首次访问时计算
    pub fn object_name(&self) -> &str {
        self.object_name.get_or_init(|| {
            let properties = self
                .scoping_properties()
                .into_iter()
                .map(|(property, value)| format!("{}={}", property, value))
                .collect::<Vec<_>>()
                .join(",");
            format!("{}:{}", MANAGEMENT_DOMAIN, properties)
        })
    }

    /// 添加导出器
    pub fn add_exporter(&self, exporter: Arc<dyn ManagementExporter>) {
        debug!("添加管理导出器: {} -> {}", exporter.name(), self.object_name());
        self.exporters.write().push(exporter);
    }

    /// 本上下文及祖先上下文的所有导出器
    pub fn exporters(&self) -> Vec<Arc<dyn ManagementExporter>> {
        let mut exporters = self.exporters.read().clone();
        if let Some(parent) = &self.parent {
            exporters.extend(parent.exporters());
        }
        exporters
    }

    /// 导出组件，已导出的键不会重复导出
    pub fn register(&self, key: &ComponentKey, implementation: TypeKey, instance: &Instance) {
        let resource = match self.resources.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => return,
            dashmap::mapref::entry::Entry::Vacant(slot) => slot
                .insert(ManagedResource {
                    key: key.clone(),
                    object_name: format!("{},component={}", self.object_name(), key),
                    implementation,
                    instance: Arc::clone(instance),
                    registered_at: Utc::now(),
                })
                .clone(),
        };

        for exporter in self.exporters() {
            if let Err(e) = exporter.export(&resource) {
                warn!(
                    "管理导出失败: {} -> {}, 原因: {}",
                    exporter.name(),
                    resource.object_name(),
                    e
                );
            }
        }
    }

    /// 撤销组件导出
    pub fn unregister(&self, key: &ComponentKey) -> bool {
        match self.resources.remove(key) {
            Some((_, resource)) => {
                self.unexport(&resource);
                true
            }
            None => false,
        }
    }

    /// 撤销所有导出
    pub fn unregister_all(&self) {
        let keys: Vec<ComponentKey> = self.resources.iter().map(|entry| entry.key().clone()).collect();
        for key in keys {
            self.unregister(&key);
        }
    }

    /// 已导出的组件键
    pub fn registered_keys(&self) -> Vec<ComponentKey> {
        self.resources.iter().map(|entry| entry.key().clone()).collect()
    }

    /// 是否已导出
    pub fn is_registered(&self, key: &ComponentKey) -> bool {
        self.resources.contains_key(key)
    }

    fn unexport(&self, resource: &ManagedResource) {
        for exporter in self.exporters() {
            if let Err(e) = exporter.unexport(resource) {
                warn!(
                    "撤销管理导出失败: {} -> {}, 原因: {}",
                    exporter.name(),
                    resource.object_name(),
                    e
                );
            }
        }
    }
}

impl fmt::Debug for ManagementContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagementContext")
            .field("scoping", &self.scoping)
            .field("exporters", &self.exporters.read().len())
            .field("resources", &self.resources.len())
            .finish()
    }
}
