//! 组件声明模型

use infrastructure_common::InitParams;
use serde::{Deserialize, Serialize};

fn default_singleton() -> bool {
    true
}

/// 组件声明
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDeclaration {
    /// 组件键，缺省时使用实现类型
    #[serde(default)]
    pub key: Option<String>,
    /// 实现名称，对应组件目录中的定义
    #[serde(rename = "type")]
    pub implementation: String,
    /// 构造器初始化参数
    #[serde(default)]
    pub init_params: InitParams,
    /// 组件插件
    #[serde(default)]
    pub plugins: Vec<PluginDeclaration>,
    /// 是否单例
    #[serde(default = "default_singleton")]
    pub singleton: bool,
}

impl ComponentDeclaration {
    /// 创建组件声明
    pub fn new(implementation: impl Into<String>) -> Self {
        Self {
            key: None,
            implementation: implementation.into(),
            init_params: InitParams::new(),
            plugins: Vec::new(),
            singleton: true,
        }
    }

    /// 设置组件键
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// 设置初始化参数
    pub fn with_init_params(mut self, init_params: InitParams) -> Self {
        self.init_params = init_params;
        self
    }

    /// 添加插件
    pub fn with_plugin(mut self, plugin: PluginDeclaration) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// 声明为原型组件
    pub fn prototype(mut self) -> Self {
        self.singleton = false;
        self
    }

    /// 外部插件匹配使用的目标名称
    pub fn target_name(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.implementation)
    }
}

/// 插件声明
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDeclaration {
    /// 插件实例名称
    pub name: String,
    /// 插件类型，对应组件目录中的插件模板
    #[serde(rename = "type")]
    pub plugin_type: String,
    /// 插件参数
    #[serde(default)]
    pub init_params: InitParams,
}

impl PluginDeclaration {
    /// 创建插件声明
    pub fn new(name: impl Into<String>, plugin_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            plugin_type: plugin_type.into(),
            init_params: InitParams::new(),
        }
    }

    /// 设置插件参数
    pub fn with_init_params(mut self, init_params: InitParams) -> Self {
        self.init_params = init_params;
        self
    }
}

/// 外部插件声明，作用于其他声明中的组件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalPluginsDeclaration {
    /// 目标组件（键或实现名称）
    pub target_component: String,
    /// 插件
    #[serde(default)]
    pub plugins: Vec<PluginDeclaration>,
}

/// 容器配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerConfiguration {
    /// 组件声明
    #[serde(default)]
    pub components: Vec<ComponentDeclaration>,
    /// 外部插件声明
    #[serde(default)]
    pub external_plugins: Vec<ExternalPluginsDeclaration>,
}

impl ContainerConfiguration {
    /// 合并另一份配置，声明按顺序追加
    pub fn merge(&mut self, other: ContainerConfiguration) {
        self.components.extend(other.components);
        self.external_plugins.extend(other.external_plugins);
    }

    /// 某个组件的全部外部插件
    pub fn external_plugins_for(&self, declaration: &ComponentDeclaration) -> Vec<&PluginDeclaration> {
        self.external_plugins
            .iter()
            .filter(|external| external.target_component == declaration.target_name())
            .flat_map(|external| external.plugins.iter())
            .collect()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.external_plugins.is_empty()
    }
}
