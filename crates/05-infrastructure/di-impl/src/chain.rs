//! 拦截器链工厂
//!
//! 链形状只解析一次：内置节点（从内到外：并发注册表、缓存、管理导出）加上
//! 发现的可插拔节点，按排序约束两轮放置。之后每个容器按缓存的形状创建新节点。

use crate::caching::CachingContainer;
use crate::concurrent::ConcurrentContainer;
use crate::management::ManageableContainer;
use di_abstractions::{
    ChainShape, InterceptorChainFactory, InterceptorDiscovery, InterceptorKind,
    StaticInterceptorDiscovery,
};
use infrastructure_common::{ContainerError, ContainerResult};
use once_cell::sync::{Lazy, OnceCell};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

static BUILT_IN_SHAPE: Lazy<Arc<ChainShape>> = Lazy::new(|| {
    Arc::new(ChainShape::from_parts(
        ConcurrentContainer::kind(),
        vec![CachingContainer::kind(), ManageableContainer::kind()],
    ))
});

static GLOBAL: Lazy<Arc<DefaultInterceptorChainFactory>> = Lazy::new(|| {
    let factory = DefaultInterceptorChainFactory::new(Arc::new(StaticInterceptorDiscovery::new()));
    let _ = factory.shape.set(DefaultInterceptorChainFactory::built_in_shape());
    Arc::new(factory)
});

/// 默认拦截器链工厂
pub struct DefaultInterceptorChainFactory {
    discovery: Arc<dyn InterceptorDiscovery>,
    strict: bool,
    shape: OnceCell<Arc<ChainShape>>,
}

impl DefaultInterceptorChainFactory {
    /// 创建工厂
    pub fn new(discovery: Arc<dyn InterceptorDiscovery>) -> Self {
        Self {
            discovery,
            strict: false,
            shape: OnceCell::new(),
        }
    }

    /// 排序引用无法解析时直接失败
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// 进程级默认工厂，不带可插拔节点
    pub fn global() -> Arc<DefaultInterceptorChainFactory> {
        Arc::clone(&GLOBAL)
    }

    /// 只含内置节点的链形状
    pub fn built_in_shape() -> Arc<ChainShape> {
        Arc::clone(&BUILT_IN_SHAPE)
    }

    /// 内置节点，从内到外
    pub fn built_in_kinds() -> Vec<InterceptorKind> {
        vec![
            ConcurrentContainer::kind(),
            CachingContainer::kind(),
            ManageableContainer::kind(),
        ]
    }
}

impl InterceptorChainFactory for DefaultInterceptorChainFactory {
    fn chain_shape(&self) -> ContainerResult<Arc<ChainShape>> {
        self.shape
            .get_or_try_init(|| {
                let dynamic = self.discovery.discover();
                let ordered =
                    resolve_interceptor_order(Self::built_in_kinds(), dynamic, self.strict)?;
                let shape = ChainShape::new(ordered)?;
                info!(
                    "拦截器链已确定: {} (发现器: {})",
                    shape.ids().join(" <- "),
                    self.discovery.name()
                );
                Ok(Arc::new(shape))
            })
            .map(Arc::clone)
    }
}

impl fmt::Debug for DefaultInterceptorChainFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultInterceptorChainFactory")
            .field("discovery", &self.discovery.name())
            .field("strict", &self.strict)
            .field("shape", &self.shape.get().map(|shape| shape.ids().join(",")))
            .finish()
    }
}

/// 确定拦截器顺序，结果从内到外
///
/// “在 X 之前”放在 X 的外侧紧邻位置，“在 X 之后”放在 X 的内侧紧邻位置，
/// 无约束时追加到最外层。第一轮只放置引用已就位的节点，第二轮处理剩余节点；
/// 仍无法解析的引用在宽松模式下告警并追加，严格模式下返回错误。
pub fn resolve_interceptor_order(
    built_in: Vec<InterceptorKind>,
    dynamic: Vec<InterceptorKind>,
    strict: bool,
) -> ContainerResult<Vec<Arc<InterceptorKind>>> {
    let mut resolved: Vec<Arc<InterceptorKind>> = built_in.into_iter().map(Arc::new).collect();
    let mut pending: Vec<Arc<InterceptorKind>> = Vec::new();

    for kind in dynamic.into_iter().map(Arc::new) {
        if !place(&mut resolved, &kind) {
            pending.push(kind);
        }
    }

    for kind in pending {
        if place(&mut resolved, &kind) {
            continue;
        }
        let reference = reference_of(&kind).unwrap_or_default().to_string();
        if strict {
            return Err(ContainerError::UnresolvedInterceptorReference {
                interceptor: kind.id().to_string(),
                reference,
            });
        }
        warn!(
            "拦截器 {} 引用了未知的拦截器 {}, 追加到链的最外层",
            kind.id(),
            reference
        );
        resolved.push(kind);
    }
    Ok(resolved)
}

fn reference_of(kind: &InterceptorKind) -> Option<&str> {
    let ordering = kind.ordering();
    ordering
        .runs_before
        .as_deref()
        .or(ordering.runs_after.as_deref())
}

/// 尝试放置，引用尚未就位时返回 `false`
fn place(resolved: &mut Vec<Arc<InterceptorKind>>, kind: &Arc<InterceptorKind>) -> bool {
    let ordering = kind.ordering();
    let position = |id: &str| resolved.iter().position(|existing| existing.id() == id);

    let index = if let Some(before) = ordering.runs_before.as_deref() {
        if before.is_empty() {
            warn!("拦截器 {} 的排序引用为空, 追加到链的最外层", kind.id());
            Some(resolved.len())
        } else {
            position(before).map(|index| index + 1)
        }
    } else if let Some(after) = ordering.runs_after.as_deref() {
        if after.is_empty() {
            warn!("拦截器 {} 的排序引用为空, 追加到链的最外层", kind.id());
            Some(resolved.len())
        } else {
            position(after)
        }
    } else {
        Some(resolved.len())
    };

    match index {
        Some(index) => {
            resolved.insert(index, Arc::clone(kind));
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use di_abstractions::{Interceptor, InterceptorContext, InterceptorOrdering};

    struct Passthrough {
        id: String,
        context: InterceptorContext,
    }

    #[async_trait::async_trait]
    impl Interceptor for Passthrough {
        fn id(&self) -> &str {
            &self.id
        }

        fn successor(&self) -> Option<&Arc<dyn Interceptor>> {
            self.context.successor()
        }
    }

    fn kind(ordering: InterceptorOrdering) -> InterceptorKind {
        let id = ordering.id.clone();
        InterceptorKind::new(ordering, move |context| {
            Arc::new(Passthrough {
                id: id.clone(),
                context,
            }) as Arc<dyn Interceptor>
        })
    }

    fn ids(kinds: &[Arc<InterceptorKind>]) -> Vec<&str> {
        kinds.iter().map(|kind| kind.id()).collect()
    }

    #[test]
    fn test_before_and_after_placement() {
        let order = resolve_interceptor_order(
            DefaultInterceptorChainFactory::built_in_kinds(),
            vec![
                kind(InterceptorOrdering::new("Audit").runs_after("Cache")),
                kind(InterceptorOrdering::new("Tenancy").runs_before("Management")),
                kind(InterceptorOrdering::new("Trace")),
            ],
            false,
        )
        .unwrap();

        assert_eq!(
            ids(&order),
            vec!["ConcurrentContainer", "Audit", "Cache", "Management", "Tenancy", "Trace"]
        );
    }

    #[test]
    fn test_second_pass_resolves_forward_references() {
        let order = resolve_interceptor_order(
            DefaultInterceptorChainFactory::built_in_kinds(),
            vec![
                kind(InterceptorOrdering::new("Outer").runs_before("Tenancy")),
                kind(InterceptorOrdering::new("Tenancy").runs_before("Management")),
            ],
            false,
        )
        .unwrap();

        assert_eq!(
            ids(&order),
            vec!["ConcurrentContainer", "Cache", "Management", "Tenancy", "Outer"]
        );
    }

    #[test]
    fn test_unresolved_reference_lenient_and_strict() {
        let lenient = resolve_interceptor_order(
            DefaultInterceptorChainFactory::built_in_kinds(),
            vec![kind(InterceptorOrdering::new("Orphan").runs_after("Missing"))],
            false,
        )
        .unwrap();
        assert_eq!(ids(&lenient).last(), Some(&"Orphan"));

        let strict = resolve_interceptor_order(
            DefaultInterceptorChainFactory::built_in_kinds(),
            vec![kind(InterceptorOrdering::new("Orphan").runs_after("Missing"))],
            true,
        );
        assert!(matches!(
            strict,
            Err(ContainerError::UnresolvedInterceptorReference { reference, .. }) if reference == "Missing"
        ));
    }

    #[test]
    fn test_shape_is_cached() {
        let factory = DefaultInterceptorChainFactory::new(Arc::new(
            StaticInterceptorDiscovery::new().with(kind(InterceptorOrdering::new("Trace"))),
        ));
        let first = factory.chain_shape().unwrap();
        let second = factory.chain_shape().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.ids().last(), Some(&"Trace"));
    }
}
