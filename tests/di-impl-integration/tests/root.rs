//! 根容器场景：进程级安装、构建期间重入、关闭后重建

use di_impl::{Container, RootContainer};
use infrastructure_common::ContainerError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn test_global_root_boots_once_and_rejects_reentry() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let root = Arc::new(RootContainer::new(move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            let nested = RootContainer::global()
                .ok_or(ContainerError::AlreadyBooting)?
                .get();
            assert!(matches!(nested, Err(ContainerError::AlreadyBooting)));
        }
        let container = Container::new("global-root");
        container.register_component_instance("version", Arc::new("1.0".to_string()))?;
        Ok(container)
    }));
    RootContainer::install_global(Arc::clone(&root));

    let container = RootContainer::global().unwrap().get().unwrap();
    assert_eq!(container.require::<String>().unwrap().as_str(), "1.0");
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    let again = RootContainer::global().unwrap().get().unwrap();
    assert_eq!(container, again);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    assert!(RootContainer::uninstall_global().is_some());
    assert!(RootContainer::global().is_none());
}

#[tokio::test]
async fn test_shutdown_then_rebuild() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&builds);
    let root = RootContainer::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Container::new("rebuilt-root"))
    });

    let first = root.get().unwrap();
    first.start().await.unwrap();
    root.shutdown().await.unwrap();
    assert!(root.current().is_none());

    let second = root.get().unwrap();
    assert_ne!(first, second);
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}
