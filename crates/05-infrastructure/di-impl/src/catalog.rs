//! 组件目录
//!
//! 把配置中的实现名称和插件类型映射到已注册的组件定义与插件模板，
//! 再按声明顺序注册到容器。

use crate::container::Container;
use config_abstractions::{ComponentDeclaration, ContainerConfiguration, PluginDeclaration};
use di_abstractions::{ComponentAdapter, ComponentDefinition, ComponentPlugin};
use infrastructure_common::{ComponentKey, ContainerError, ContainerResult, TypeKey};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// 组件目录
#[derive(Debug, Clone, Default)]
pub struct ComponentCatalog {
    definitions: HashMap<String, Arc<ComponentDefinition>>,
    plugins: HashMap<String, ComponentPlugin>,
    key_types: HashMap<String, TypeKey>,
}

impl ComponentCatalog {
    /// 创建空目录
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记组件定义
    pub fn with_definition(mut self, name: impl Into<String>, definition: ComponentDefinition) -> Self {
        self.definitions.insert(name.into(), Arc::new(definition));
        self
    }

    /// 登记插件模板
    pub fn with_plugin(mut self, plugin_type: impl Into<String>, plugin: ComponentPlugin) -> Self {
        self.plugins.insert(plugin_type.into(), plugin);
        self
    }

    /// 把配置中的键名映射为类型键
    pub fn with_key_type<T: ?Sized + 'static>(mut self, name: impl Into<String>) -> Self {
        self.key_types.insert(name.into(), TypeKey::of::<T>());
        self
    }

    /// 按名称查找组件定义
    pub fn definition(&self, name: &str) -> Option<&Arc<ComponentDefinition>> {
        self.definitions.get(name)
    }

    /// 声明对应的组件键
    pub fn component_key(
        &self,
        declaration: &ComponentDeclaration,
        definition: &ComponentDefinition,
    ) -> ComponentKey {
        match declaration.key.as_deref() {
            Some(name) => match self.key_types.get(name) {
                Some(ty) => ComponentKey::Type(*ty),
                None => ComponentKey::named(name),
            },
            None => ComponentKey::Type(definition.implementation()),
        }
    }

    /// 按声明创建适配器
    pub fn adapter_for(
        &self,
        declaration: &ComponentDeclaration,
        external: &[&PluginDeclaration],
    ) -> ContainerResult<ComponentAdapter> {
        let definition = self.definitions.get(&declaration.implementation).ok_or_else(|| {
            ContainerError::UnknownImplementation {
                name: declaration.implementation.clone(),
            }
        })?;

        let key = self.component_key(declaration, definition);
        let mut adapter = ComponentAdapter::implementation(key, Arc::clone(definition))
            .with_init_params(declaration.init_params.clone());
        for plugin in declaration.plugins.iter().chain(external.iter().copied()) {
            adapter = adapter.with_plugin(self.plugin_for(plugin, definition)?);
        }
        if !declaration.singleton {
            adapter = adapter.prototype();
        }
        Ok(adapter)
    }

    fn plugin_for(
        &self,
        declaration: &PluginDeclaration,
        definition: &ComponentDefinition,
    ) -> ContainerResult<ComponentPlugin> {
        let template = self.plugins.get(&declaration.plugin_type).ok_or_else(|| {
            ContainerError::UnknownImplementation {
                name: declaration.plugin_type.clone(),
            }
        })?;
        if template.target() != definition.implementation() {
            return Err(ContainerError::TypeMismatch {
                key: declaration.name.clone(),
                expected: definition.implementation().name().to_string(),
                implementation: template.target().name().to_string(),
            });
        }
        Ok(template
            .clone()
            .with_name(declaration.name.clone())
            .with_params(declaration.init_params.clone()))
    }

    /// 把配置中的全部声明注册到容器，返回注册数量
    pub fn populate(
        &self,
        container: &Container,
        configuration: &ContainerConfiguration,
    ) -> ContainerResult<usize> {
        for declaration in &configuration.components {
            let external = configuration.external_plugins_for(declaration);
            let adapter = self.adapter_for(declaration, &external)?;
            debug!(
                "按声明注册组件: {} ({})",
                adapter.key(),
                declaration.implementation
            );
            container.register_component(adapter)?;
        }
        info!(
            "容器 {} 已注册 {} 个声明组件",
            container.name(),
            configuration.components.len()
        );
        Ok(configuration.components.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infrastructure_common::InitParams;
    use parking_lot::Mutex;

    struct Pool {
        size: u32,
        tags: Mutex<Vec<String>>,
    }

    trait Datasource: Send + Sync {
        fn size(&self) -> u32;
    }

    impl Datasource for Pool {
        fn size(&self) -> u32 {
            self.size
        }
    }

    fn catalog() -> ComponentCatalog {
        ComponentCatalog::new()
            .with_definition(
                "Pool",
                ComponentDefinition::builder::<Pool>()
                    .constructor(|params: InitParams| {
                        anyhow::Ok(Pool {
                            size: params.get::<u32>("size")?.unwrap_or(1),
                            tags: Mutex::new(Vec::new()),
                        })
                    })
                    .provides::<dyn Datasource>(|pool| pool as Arc<dyn Datasource>)
                    .build(),
            )
            .with_plugin(
                "Tag",
                ComponentPlugin::new::<Pool, _>("tag", |pool, params, _resolver| {
                    pool.tags.lock().push(params.require::<String>("value")?);
                    Ok(())
                }),
            )
            .with_key_type::<dyn Datasource>("datasource")
    }

    #[test]
    fn test_populate_from_declarations() {
        let configuration: ContainerConfiguration = serde_json::from_value(serde_json::json!({
            "components": [
                {
                    "key": "datasource",
                    "type": "Pool",
                    "init_params": { "size": 8 },
                    "plugins": [ { "name": "primary", "type": "Tag", "init_params": { "value": "primary" } } ]
                }
            ],
            "external_plugins": [
                { "target_component": "datasource", "plugins": [ { "name": "extra", "type": "Tag", "init_params": { "value": "extra" } } ] }
            ]
        }))
        .unwrap();

        let container = Container::new("catalog");
        assert_eq!(catalog().populate(&container, &configuration).unwrap(), 1);

        let datasource = container.require::<dyn Datasource>().unwrap();
        assert_eq!(datasource.size(), 8);
        let pool = container
            .get_component_instance::<Pool>(ComponentKey::of::<dyn Datasource>())
            .unwrap()
            .unwrap();
        assert_eq!(*pool.tags.lock(), vec!["primary", "extra"]);
    }

    #[test]
    fn test_unknown_implementation_is_reported() {
        let configuration = ContainerConfiguration {
            components: vec![ComponentDeclaration::new("Missing")],
            external_plugins: Vec::new(),
        };
        let container = Container::new("catalog-missing");
        assert!(matches!(
            catalog().populate(&container, &configuration),
            Err(ContainerError::UnknownImplementation { name }) if name == "Missing"
        ));
    }

    #[test]
    fn test_prototype_declaration_creates_fresh_instances() {
        let configuration = ContainerConfiguration {
            components: vec![ComponentDeclaration::new("Pool").with_key("pool").prototype()],
            external_plugins: Vec::new(),
        };
        let container = Container::new("catalog-prototype");
        catalog().populate(&container, &configuration).unwrap();

        let first = container.get_component_instance::<Pool>("pool").unwrap().unwrap();
        let second = container.get_component_instance::<Pool>("pool").unwrap().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
