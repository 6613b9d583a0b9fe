//! 组件定义与构造器
//!
//! 组件类型通过显式注册的构造函数描述如何被创建。容器按参数个数从多到少
//! 依次尝试，第一个所有参数都能解析的构造器被调用。

use crate::adapter::{ErasedArc, Instance, ProvidedTypes};
use crate::resolver::Resolver;
use infrastructure_common::{Disposable, InitParams, Startable, TypeKey};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// 构造器参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameter {
    /// 注入组件声明的初始化参数
    InitParams,
    /// 按类型解析的依赖
    Dependency(TypeKey),
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitParams => f.write_str("InitParams"),
            Self::Dependency(ty) => write!(f, "{}", ty),
        }
    }
}

/// 已解析的构造器实参
pub enum Argument {
    /// 初始化参数
    InitParams(InitParams),
    /// 依赖实例，内部是 `Arc<T>`
    Dependency(ErasedArc),
}

/// 可注入的构造器参数类型
pub trait Inject: Sized + 'static {
    /// 参数描述
    fn parameter() -> Parameter;

    /// 从已解析的实参取值
    fn from_argument(argument: Argument) -> Option<Self>;
}

impl Inject for InitParams {
    fn parameter() -> Parameter {
        Parameter::InitParams
    }

    fn from_argument(argument: Argument) -> Option<Self> {
        match argument {
            Argument::InitParams(params) => Some(params),
            Argument::Dependency(_) => None,
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> Inject for Arc<T> {
    fn parameter() -> Parameter {
        Parameter::Dependency(TypeKey::of::<T>())
    }

    fn from_argument(argument: Argument) -> Option<Self> {
        match argument {
            Argument::Dependency(erased) => erased.downcast::<Arc<T>>().ok().map(|boxed| *boxed),
            Argument::InitParams(_) => None,
        }
    }
}

/// 构造函数 trait
///
/// 为参数个数 0 到 8 的闭包实现，每个参数都必须实现 [`Inject`]。
pub trait ConstructorFn<T, Args>: Send + Sync + 'static {
    /// 参数列表
    fn parameters(&self) -> Vec<Parameter>;

    /// 以已解析的实参调用
    fn invoke(&self, arguments: Vec<Argument>) -> anyhow::Result<T>;
}

macro_rules! impl_constructor_fn {
    ($($arg:ident),*) => {
        impl<F, T, $($arg,)*> ConstructorFn<T, ($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> anyhow::Result<T> + Send + Sync + 'static,
            $($arg: Inject,)*
        {
            fn parameters(&self) -> Vec<Parameter> {
                vec![$(<$arg as Inject>::parameter()),*]
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn invoke(&self, arguments: Vec<Argument>) -> anyhow::Result<T> {
                let mut arguments = arguments.into_iter();
                $(
                    let $arg = arguments
                        .next()
                        .and_then(<$arg as Inject>::from_argument)
                        .ok_or_else(|| {
                            anyhow::anyhow!("构造器参数不匹配: {}", std::any::type_name::<$arg>())
                        })?;
                )*
                (self)($($arg),*)
            }
        }
    };
}

impl_constructor_fn!();
impl_constructor_fn!(A1);
impl_constructor_fn!(A1, A2);
impl_constructor_fn!(A1, A2, A3);
impl_constructor_fn!(A1, A2, A3, A4);
impl_constructor_fn!(A1, A2, A3, A4, A5);
impl_constructor_fn!(A1, A2, A3, A4, A5, A6);
impl_constructor_fn!(A1, A2, A3, A4, A5, A6, A7);
impl_constructor_fn!(A1, A2, A3, A4, A5, A6, A7, A8);

type ConstructorInvoke = Arc<dyn Fn(Vec<Argument>) -> anyhow::Result<Instance> + Send + Sync>;

/// 类型擦除后的构造器
#[derive(Clone)]
pub struct Constructor {
    parameters: Vec<Parameter>,
    invoke: ConstructorInvoke,
}

impl Constructor {
    /// 参数列表
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// 参数个数
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// 调用构造器
    pub fn invoke(&self, arguments: Vec<Argument>) -> anyhow::Result<Instance> {
        (self.invoke)(arguments)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("parameters", &self.parameters)
            .field("invoke", &"<function>")
            .finish()
    }
}

type PluginFn =
    Arc<dyn Fn(&Instance, &InitParams, &Resolver<'_>) -> anyhow::Result<()> + Send + Sync>;

fn plugin_fn<F>(apply: F) -> PluginFn
where
    F: Fn(&Instance, &InitParams, &Resolver<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(apply)
}

/// 组件插件
///
/// 在组件构造完成后执行，此时组件已发布到解析会话中，插件内对该组件的
/// 查找会得到正在构建的实例。
#[derive(Clone)]
pub struct ComponentPlugin {
    name: String,
    target: TypeKey,
    params: InitParams,
    apply: PluginFn,
}

impl ComponentPlugin {
    /// 创建作用于类型 `T` 的插件
    pub fn new<T, F>(name: impl Into<String>, apply: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Arc<T>, &InitParams, &Resolver<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            target: TypeKey::of::<T>(),
            params: InitParams::new(),
            apply: plugin_fn(move |instance, params, resolver| {
                let component = Arc::clone(instance).downcast::<T>().map_err(|_| {
                    anyhow::anyhow!("插件目标类型不匹配: {}", std::any::type_name::<T>())
                })?;
                apply(&component, params, resolver)
            }),
        }
    }

    /// 设置插件参数
    pub fn with_params(mut self, params: InitParams) -> Self {
        self.params = params;
        self
    }

    /// 重命名插件
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 插件名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 目标类型
    pub fn target(&self) -> TypeKey {
        self.target
    }

    /// 插件参数
    pub fn params(&self) -> &InitParams {
        &self.params
    }

    /// 作用于组件实例
    pub fn apply(&self, instance: &Instance, resolver: &Resolver<'_>) -> anyhow::Result<()> {
        (self.apply)(instance, &self.params, resolver)
    }
}

impl fmt::Debug for ComponentPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentPlugin")
            .field("name", &self.name)
            .field("target", &self.target.name())
            .field("params", &self.params)
            .field("apply", &"<function>")
            .finish()
    }
}

/// 组件定义
///
/// 描述一个实现类型：构造器（按参数个数降序）、提供的类型和内置插件。
#[derive(Debug, Clone)]
pub struct ComponentDefinition {
    implementation: TypeKey,
    constructors: Vec<Constructor>,
    provides: ProvidedTypes,
    plugins: Vec<ComponentPlugin>,
}

impl ComponentDefinition {
    /// 创建定义构建器
    pub fn builder<T: Send + Sync + 'static>() -> DefinitionBuilder<T> {
        DefinitionBuilder {
            constructors: Vec::new(),
            provides: ProvidedTypes::of::<T>(),
            plugins: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// 实现类型
    pub fn implementation(&self) -> TypeKey {
        self.implementation
    }

    /// 构造器，按参数个数降序
    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }

    /// 提供的类型
    pub fn provides(&self) -> &ProvidedTypes {
        &self.provides
    }

    /// 内置插件
    pub fn plugins(&self) -> &[ComponentPlugin] {
        &self.plugins
    }
}

/// 组件定义构建器
pub struct DefinitionBuilder<T> {
    constructors: Vec<Constructor>,
    provides: ProvidedTypes,
    plugins: Vec<ComponentPlugin>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> DefinitionBuilder<T> {
    /// 添加构造器
    pub fn constructor<Args, F>(mut self, constructor: F) -> Self
    where
        F: ConstructorFn<T, Args>,
    {
        let parameters = constructor.parameters();
        let invoke: ConstructorInvoke =
            Arc::new(move |arguments: Vec<Argument>| -> anyhow::Result<Instance> {
                let component = constructor.invoke(arguments)?;
                Ok(Arc::new(component) as Instance)
            });
        self.constructors.push(Constructor { parameters, invoke });
        self
    }

    /// 声明组件可作为类型 `I` 解析
    pub fn provides<I>(mut self, convert: impl Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.provides.add::<T, I, _>(convert);
        self
    }

    /// 声明组件参与启动和停止
    pub fn startable(self) -> Self
    where
        T: Startable,
    {
        self.provides::<dyn Startable>(|component| component as Arc<dyn Startable>)
    }

    /// 声明组件参与销毁
    pub fn disposable(self) -> Self
    where
        T: Disposable,
    {
        self.provides::<dyn Disposable>(|component| component as Arc<dyn Disposable>)
    }

    /// 添加内置插件
    pub fn plugin(mut self, plugin: ComponentPlugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// 构建定义
    pub fn build(mut self) -> ComponentDefinition {
        self.constructors
            .sort_by_key(|constructor| std::cmp::Reverse(constructor.arity()));
        ComponentDefinition {
            implementation: TypeKey::of::<T>(),
            constructors: self.constructors,
            provides: self.provides,
            plugins: self.plugins,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Repository;

    struct Service {
        repository: Option<Arc<Repository>>,
        size: u32,
    }

    #[test]
    fn test_constructors_sorted_by_descending_arity() {
        let definition = ComponentDefinition::builder::<Service>()
            .constructor(|| anyhow::Ok(Service { repository: None, size: 0 }))
            .constructor(|repository: Arc<Repository>, params: InitParams| {
                let size = params.get::<u32>("size")?.unwrap_or(1);
                anyhow::Ok(Service {
                    repository: Some(repository),
                    size,
                })
            })
            .build();

        let arities: Vec<_> = definition.constructors().iter().map(Constructor::arity).collect();
        assert_eq!(arities, vec![2, 0]);
        assert_eq!(
            definition.constructors()[0].parameters(),
            &[
                Parameter::Dependency(TypeKey::of::<Repository>()),
                Parameter::InitParams
            ]
        );
        assert_eq!(definition.implementation(), TypeKey::of::<Service>());
    }

    #[test]
    fn test_invoke_with_arguments() {
        let definition = ComponentDefinition::builder::<Service>()
            .constructor(|repository: Arc<Repository>, params: InitParams| {
                anyhow::Ok(Service {
                    repository: Some(repository),
                    size: params.require::<u32>("size")?,
                })
            })
            .build();

        let repository = Arc::new(Repository);
        let arguments = vec![
            Argument::Dependency(Box::new(Arc::clone(&repository))),
            Argument::InitParams(InitParams::new().with("size", 7)),
        ];
        let instance = definition.constructors()[0].invoke(arguments).unwrap();
        let service = instance.downcast::<Service>().ok().unwrap();

        assert_eq!(service.size, 7);
        assert!(Arc::ptr_eq(service.repository.as_ref().unwrap(), &repository));
    }

    #[test]
    fn test_invoke_with_wrong_arguments_fails() {
        let definition = ComponentDefinition::builder::<Service>()
            .constructor(|repository: Arc<Repository>| {
                anyhow::Ok(Service {
                    repository: Some(repository),
                    size: 0,
                })
            })
            .build();

        let result = definition.constructors()[0].invoke(vec![Argument::InitParams(InitParams::new())]);
        assert!(result.is_err());
    }
}
