//! 解析场景：插件回查、两级插件回查、构造循环、首次实例化竞争、缓存一致性、父子委托、目录装配

use config_abstractions::ContainerConfiguration;
use di_abstractions::{ComponentDefinition, ComponentPlugin};
use di_impl::{ComponentCatalog, Container};
use infrastructure_common::{ContainerError, InitParams};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

struct Node {
    saw_itself: AtomicBool,
}

#[test]
fn test_plugin_lookup_of_its_own_target_returns_same_instance() {
    let container = Container::new("plugin-cycle");
    container
        .register_definition(
            ComponentDefinition::builder::<Node>()
                .constructor(|| {
                    anyhow::Ok(Node {
                        saw_itself: AtomicBool::new(false),
                    })
                })
                .plugin(ComponentPlugin::new::<Node, _>(
                    "self-check",
                    |node, _params, resolver| {
                        let same = resolver.require::<Node>()?;
                        node.saw_itself
                            .store(Arc::ptr_eq(node, &same), Ordering::SeqCst);
                        Ok(())
                    },
                ))
                .build(),
        )
        .unwrap();

    let node = container.require::<Node>().unwrap();
    assert!(node.saw_itself.load(Ordering::SeqCst));
    assert!(Arc::ptr_eq(&node, &container.require::<Node>().unwrap()));
}

struct Hub {
    spoke: parking_lot::Mutex<Option<Arc<Spoke>>>,
}

struct Spoke {
    hub: Arc<Hub>,
}

#[test]
fn test_plugin_reaching_back_through_a_dependency_gets_same_instance() {
    let container = Container::new("plugin-two-level");
    container
        .register_definition(
            ComponentDefinition::builder::<Spoke>()
                .constructor(|hub: Arc<Hub>| anyhow::Ok(Spoke { hub }))
                .build(),
        )
        .unwrap();
    container
        .register_definition(
            ComponentDefinition::builder::<Hub>()
                .constructor(|| {
                    anyhow::Ok(Hub {
                        spoke: parking_lot::Mutex::new(None),
                    })
                })
                .plugin(ComponentPlugin::new::<Hub, _>(
                    "attach-spoke",
                    |hub, _params, resolver| {
                        let spoke = resolver.require::<Spoke>()?;
                        *hub.spoke.lock() = Some(spoke);
                        Ok(())
                    },
                ))
                .build(),
        )
        .unwrap();

    let hub = container.require::<Hub>().unwrap();
    let spoke = hub.spoke.lock().clone().unwrap();
    assert!(Arc::ptr_eq(&spoke.hub, &hub));
    assert!(Arc::ptr_eq(&spoke, &container.require::<Spoke>().unwrap()));
    assert!(Arc::ptr_eq(&hub, &container.require::<Hub>().unwrap()));
    assert_eq!(container.instantiation_order().len(), 2);
}

struct Left(#[allow(dead_code)] Arc<Right>);
struct Right(#[allow(dead_code)] Arc<Left>);

#[test]
fn test_constructor_cycle_is_reported() {
    let container = Container::new("constructor-cycle");
    container
        .register_definition(
            ComponentDefinition::builder::<Left>()
                .constructor(|right: Arc<Right>| anyhow::Ok(Left(right)))
                .build(),
        )
        .unwrap();
    container
        .register_definition(
            ComponentDefinition::builder::<Right>()
                .constructor(|left: Arc<Left>| anyhow::Ok(Right(left)))
                .build(),
        )
        .unwrap();

    assert!(matches!(
        container.require::<Left>(),
        Err(ContainerError::CyclicDependency { .. })
    ));
    assert!(container.instantiation_order().is_empty());
}

struct Counter;

#[test]
fn test_first_instantiation_race_creates_one_instance() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&created);
    let container = Container::new("instantiation-race");
    container
        .register_definition(
            ComponentDefinition::builder::<Counter>()
                .constructor(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    std::thread::sleep(std::time::Duration::from_millis(10));
                    anyhow::Ok(Counter)
                })
                .build(),
        )
        .unwrap();
    let barrier = Barrier::new(8);

    let instances: Vec<Arc<Counter>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    container.require::<Counter>().unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(instances.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(container.instantiation_order().len(), 1);
}

#[test]
fn test_cache_follows_registration_changes() {
    let parent = Container::new("cache-parent");
    let child = parent.child("cache-child").unwrap();

    assert!(child.get_component_instance_of_type::<String>().unwrap().is_none());
    parent
        .register_component_instance("motd", Arc::new("welcome".to_string()))
        .unwrap();
    assert_eq!(
        child.require::<String>().unwrap().as_str(),
        "welcome"
    );

    parent.unregister_component("motd");
    assert!(child.get_component_instance_of_type::<String>().unwrap().is_none());
}

#[test]
fn test_delegation_is_one_way() {
    let parent = Container::new("delegation-parent");
    let child = parent.child("delegation-child").unwrap();
    parent
        .register_component_instance("shared", Arc::new(7_u32))
        .unwrap();
    child
        .register_component_instance("local", Arc::new(3_u64))
        .unwrap();

    assert_eq!(*child.require::<u32>().unwrap(), 7);
    assert!(parent.get_component_instance_of_type::<u64>().unwrap().is_none());
    assert!(parent.get_component_adapter("local").is_none());
}

struct Settings {
    region: String,
}

#[test]
fn test_catalog_populates_declared_components() {
    let configuration: ContainerConfiguration = serde_json::from_value(serde_json::json!({
        "components": [
            { "key": "settings", "type": "Settings", "init_params": { "region": "cn-north" } },
            { "key": "fallback", "type": "Settings" }
        ]
    }))
    .unwrap();
    let catalog = ComponentCatalog::new().with_definition(
        "Settings",
        ComponentDefinition::builder::<Settings>()
            .constructor(|params: InitParams| {
                anyhow::Ok(Settings {
                    region: params.value_param("region").unwrap_or("global").to_string(),
                })
            })
            .build(),
    );

    let container = Container::new("catalog");
    assert_eq!(catalog.populate(&container, &configuration).unwrap(), 2);

    let regions: Vec<String> = container
        .get_component_instances_of_type::<Settings>()
        .unwrap()
        .iter()
        .map(|settings| settings.region.clone())
        .collect();
    assert_eq!(regions, vec!["cn-north", "global"]);
}
