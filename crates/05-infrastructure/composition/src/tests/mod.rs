//! 内核组合测试

use crate::{KernelBuilder, KernelStatus};
use async_trait::async_trait;
use config_abstractions::{ComponentDeclaration, ContainerConfiguration};
use config_impl::{InMemoryConfigurationSource, SettingsBinder};
use di_abstractions::{
    ComponentDefinition, ContainerConfig, Interceptor, InterceptorContext, InterceptorKind,
    InterceptorOrdering,
};
use di_impl::ComponentCatalog;
use infrastructure_common::{BoxError, ContainerError, InfrastructureError, InitParams, Startable};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct Clock {
    zone: String,
    running: AtomicBool,
}

#[async_trait]
impl Startable for Clock {
    async fn start(&self) -> Result<(), BoxError> {
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), BoxError> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}

fn catalog() -> ComponentCatalog {
    ComponentCatalog::new().with_definition(
        "Clock",
        ComponentDefinition::builder::<Clock>()
            .constructor(|params: InitParams| {
                anyhow::Ok(Clock {
                    zone: params.value_param("zone").unwrap_or("UTC").to_string(),
                    running: AtomicBool::new(false),
                })
            })
            .startable()
            .build(),
    )
}

fn inline(components: Vec<ComponentDeclaration>) -> InMemoryConfigurationSource {
    InMemoryConfigurationSource::new(
        "inline",
        ContainerConfiguration {
            components,
            external_plugins: Vec::new(),
        },
    )
}

struct Passthrough {
    context: InterceptorContext,
}

#[async_trait]
impl Interceptor for Passthrough {
    fn id(&self) -> &str {
        "Orphan"
    }

    fn successor(&self) -> Option<&Arc<dyn Interceptor>> {
        self.context.successor()
    }
}

#[tokio::test]
async fn test_kernel_boots_lazily_and_runs_lifecycle() {
    let kernel = KernelBuilder::new()
        .root_name("kernel")
        .with_source(inline(vec![ComponentDeclaration::new("Clock")
            .with_init_params(InitParams::new().with("zone", "Asia/Shanghai"))]))
        .with_catalog(catalog())
        .build()
        .await
        .unwrap();

    assert!(!kernel.root().is_booted());
    assert_eq!(kernel.status().await, KernelStatus::Initialized);
    assert_eq!(kernel.metrics().await.declared_components, 1);

    kernel.start().await.unwrap();
    let clock = kernel.container().unwrap().require::<Clock>().unwrap();
    assert_eq!(clock.zone, "Asia/Shanghai");
    assert!(clock.running.load(Ordering::SeqCst));
    assert_eq!(kernel.status().await, KernelStatus::Running);

    kernel.shutdown().await.unwrap();
    assert!(!clock.running.load(Ordering::SeqCst));
    assert!(!kernel.root().is_booted());
    assert_eq!(kernel.status().await, KernelStatus::Stopped);
}

#[tokio::test]
async fn test_strict_ordering_fails_at_boot() {
    let kernel = KernelBuilder::new()
        .with_container_config(ContainerConfig {
            strict_interceptor_ordering: true,
            ..ContainerConfig::default()
        })
        .with_interceptor(InterceptorKind::new(
            InterceptorOrdering::new("Orphan").runs_after("Missing"),
            |context| Arc::new(Passthrough { context }) as Arc<dyn Interceptor>,
        ))
        .build()
        .await
        .unwrap();

    assert!(matches!(
        kernel.start().await,
        Err(InfrastructureError::Container(
            ContainerError::UnresolvedInterceptorReference { .. }
        ))
    ));
    assert_eq!(kernel.status().await, KernelStatus::Failed);
}

#[tokio::test]
async fn test_unknown_implementation_surfaces_on_boot() {
    let kernel = KernelBuilder::new()
        .with_source(inline(vec![ComponentDeclaration::new("Missing")]))
        .with_catalog(catalog())
        .build()
        .await
        .unwrap();

    assert!(matches!(
        kernel.container(),
        Err(InfrastructureError::Container(
            ContainerError::UnknownImplementation { .. }
        ))
    ));
}

#[tokio::test]
async fn test_settings_bind_container_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kernel.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        "[container]\ndeveloping = true\n\n[logging]\nlevel = \"warn\"\nansi = false"
    )
    .unwrap();

    let kernel = KernelBuilder::new()
        .with_settings(SettingsBinder::new().with_file(&path))
        .build()
        .await
        .unwrap();

    let container = kernel.container().unwrap();
    assert!(container.config().developing);
    assert!(!container.config().strict_interceptor_ordering);
    assert_eq!(
        container.interceptor_ids(),
        vec!["ConcurrentContainer", "Cache", "Management"]
    );
}
