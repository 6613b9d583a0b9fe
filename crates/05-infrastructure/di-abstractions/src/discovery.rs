//! 拦截器发现与排序约束
//!
//! 可插拔拦截器通过 [`InterceptorDiscovery`] 提供，每个拦截器以
//! [`InterceptorOrdering`] 声明自己位于某个已知拦截器之前或之后。

use crate::container::{ContainerConfig, ContainerHandle, Interceptor};
use infrastructure_common::{ContainerError, ContainerResult};
use std::fmt;
use std::sync::{Arc, Weak};

/// 拦截器排序约束
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptorOrdering {
    /// 拦截器标识
    pub id: String,
    /// 在该拦截器之前执行（位于其外层）
    pub runs_before: Option<String>,
    /// 在该拦截器之后执行（位于其内层）
    pub runs_after: Option<String>,
}

impl InterceptorOrdering {
    /// 创建无约束的排序
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            runs_before: None,
            runs_after: None,
        }
    }

    /// 在指定拦截器之前执行
    pub fn runs_before(mut self, id: impl Into<String>) -> Self {
        self.runs_before = Some(id.into());
        self
    }

    /// 在指定拦截器之后执行
    pub fn runs_after(mut self, id: impl Into<String>) -> Self {
        self.runs_after = Some(id.into());
        self
    }
}

/// 拦截器构造上下文
#[derive(Clone)]
pub struct InterceptorContext {
    holder: Weak<dyn ContainerHandle>,
    parent: Option<Weak<dyn ContainerHandle>>,
    successor: Option<Arc<dyn Interceptor>>,
    name: String,
    config: ContainerConfig,
}

impl InterceptorContext {
    /// 创建上下文
    pub fn new(
        holder: Weak<dyn ContainerHandle>,
        parent: Option<Weak<dyn ContainerHandle>>,
        name: impl Into<String>,
        config: ContainerConfig,
    ) -> Self {
        Self {
            holder,
            parent,
            successor: None,
            name: name.into(),
            config,
        }
    }

    /// 设置后继节点
    pub fn with_successor(mut self, successor: Arc<dyn Interceptor>) -> Self {
        self.successor = Some(successor);
        self
    }

    /// 持有者的弱引用
    pub fn holder_ref(&self) -> &Weak<dyn ContainerHandle> {
        &self.holder
    }

    /// 持有者
    pub fn holder(&self) -> ContainerResult<Arc<dyn ContainerHandle>> {
        self.holder
            .upgrade()
            .ok_or_else(|| ContainerError::ContainerDetached {
                container: self.name.clone(),
            })
    }

    /// 父容器
    pub fn parent(&self) -> Option<Arc<dyn ContainerHandle>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// 后继节点
    pub fn successor(&self) -> Option<&Arc<dyn Interceptor>> {
        self.successor.as_ref()
    }

    /// 容器名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 容器配置
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }
}

impl fmt::Debug for InterceptorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorContext")
            .field("name", &self.name)
            .field("successor", &self.successor.as_ref().map(|s| s.id().to_string()))
            .field("config", &self.config)
            .finish()
    }
}

type InterceptorFactory = Arc<dyn Fn(InterceptorContext) -> Arc<dyn Interceptor> + Send + Sync>;

/// 拦截器种类
///
/// 链的形状以种类列表缓存，之后每个容器按相同顺序创建新的节点。
#[derive(Clone)]
pub struct InterceptorKind {
    ordering: InterceptorOrdering,
    factory: InterceptorFactory,
}

impl InterceptorKind {
    /// 创建拦截器种类
    pub fn new<F>(ordering: InterceptorOrdering, factory: F) -> Self
    where
        F: Fn(InterceptorContext) -> Arc<dyn Interceptor> + Send + Sync + 'static,
    {
        Self {
            ordering,
            factory: Arc::new(factory),
        }
    }

    /// 拦截器标识
    pub fn id(&self) -> &str {
        &self.ordering.id
    }

    /// 排序约束
    pub fn ordering(&self) -> &InterceptorOrdering {
        &self.ordering
    }

    /// 创建节点
    pub fn instantiate(&self, context: InterceptorContext) -> Arc<dyn Interceptor> {
        (self.factory)(context)
    }
}

impl fmt::Debug for InterceptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorKind")
            .field("ordering", &self.ordering)
            .field("factory", &"<function>")
            .finish()
    }
}

/// 拦截器发现 trait
pub trait InterceptorDiscovery: Send + Sync {
    /// 发现器名称
    fn name(&self) -> &str;

    /// 发现可插拔拦截器
    fn discover(&self) -> Vec<InterceptorKind>;
}

/// 静态拦截器列表
#[derive(Debug, Clone, Default)]
pub struct StaticInterceptorDiscovery {
    kinds: Vec<InterceptorKind>,
}

impl StaticInterceptorDiscovery {
    /// 创建空列表
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加拦截器种类
    pub fn with(mut self, kind: InterceptorKind) -> Self {
        self.kinds.push(kind);
        self
    }
}

impl InterceptorDiscovery for StaticInterceptorDiscovery {
    fn name(&self) -> &str {
        "static"
    }

    fn discover(&self) -> Vec<InterceptorKind> {
        self.kinds.clone()
    }
}

/// 拦截器链形状
///
/// 从内到外排列的拦截器种类，至少包含一个。
#[derive(Debug, Clone)]
pub struct ChainShape {
    innermost: Arc<InterceptorKind>,
    outer: Vec<Arc<InterceptorKind>>,
}

impl ChainShape {
    /// 从内到外的种类列表创建
    pub fn new(kinds: Vec<Arc<InterceptorKind>>) -> ContainerResult<Self> {
        let mut kinds = kinds.into_iter();
        let innermost = kinds.next().ok_or(ContainerError::EmptyInterceptorChain)?;
        Ok(Self {
            innermost,
            outer: kinds.collect(),
        })
    }

    /// 以最内层节点和外层节点创建
    pub fn from_parts(innermost: InterceptorKind, outer: Vec<InterceptorKind>) -> Self {
        Self {
            innermost: Arc::new(innermost),
            outer: outer.into_iter().map(Arc::new).collect(),
        }
    }

    /// 从内到外的拦截器标识
    pub fn ids(&self) -> Vec<&str> {
        std::iter::once(&self.innermost)
            .chain(&self.outer)
            .map(|kind| kind.id())
            .collect()
    }

    /// 创建节点并连接后继，返回链头
    pub fn link(&self, context: InterceptorContext) -> Arc<dyn Interceptor> {
        let mut head = self.innermost.instantiate(context.clone());
        for kind in &self.outer {
            head = kind.instantiate(context.clone().with_successor(head));
        }
        head
    }
}

/// 拦截器链工厂 trait
pub trait InterceptorChainFactory: Send + Sync {
    /// 链形状，首次调用时解析并缓存
    fn chain_shape(&self) -> ContainerResult<Arc<ChainShape>>;

    /// 为容器创建拦截器链
    fn get_interceptor_chain(
        &self,
        context: InterceptorContext,
    ) -> ContainerResult<Arc<dyn Interceptor>> {
        Ok(self.chain_shape()?.link(context))
    }
}
