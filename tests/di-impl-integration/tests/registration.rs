//! 注册场景：键唯一、类型歧义、自注册、并发注册、销毁状态

use di_abstractions::ComponentDefinition;
use di_impl::Container;
use infrastructure_common::{ComponentKey, ContainerError, ContainerState};
use std::sync::{Arc, Barrier};

trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

struct English;
struct French;

impl Greeter for English {
    fn greet(&self) -> String {
        "hello".to_string()
    }
}

impl Greeter for French {
    fn greet(&self) -> String {
        "bonjour".to_string()
    }
}

fn register_greeter<T: Greeter + 'static>(container: &Container, key: &str, greeter: T) {
    container
        .register_component_instance_with(key, Arc::new(greeter), |builder| {
            builder.provides::<dyn Greeter>(|g| g as Arc<dyn Greeter>)
        })
        .unwrap();
}

#[test]
fn test_duplicate_key_is_rejected_and_first_wins() {
    let container = Container::new("uniqueness");
    register_greeter(&container, "svc", English);

    let duplicate = container.register_component_instance_with("svc", Arc::new(French), |builder| {
        builder.provides::<dyn Greeter>(|g| g as Arc<dyn Greeter>)
    });
    assert!(matches!(
        duplicate,
        Err(ContainerError::DuplicateKey { key }) if key == "svc"
    ));

    let greeter = container
        .get_component_instance::<dyn Greeter>("svc")
        .unwrap()
        .unwrap();
    assert_eq!(greeter.greet(), "hello");
}

#[test]
fn test_type_lookup_with_two_candidates_is_ambiguous() {
    let container = Container::new("ambiguity");
    register_greeter(&container, "en", English);
    register_greeter(&container, "fr", French);

    match container.get_component_instance_of_type::<dyn Greeter>() {
        Err(ContainerError::AmbiguousType { candidates, .. }) => assert_eq!(candidates.len(), 2),
        other => panic!("应为类型歧义错误, 实际: {:?}", other.map(|g| g.map(|g| g.greet()))),
    }

    let greetings: Vec<String> = container
        .get_component_instances_of_type::<dyn Greeter>()
        .unwrap()
        .iter()
        .map(|greeter| greeter.greet())
        .collect();
    assert_eq!(greetings, vec!["hello", "bonjour"]);

    container.unregister_component("fr");
    let greeter = container.require::<dyn Greeter>().unwrap();
    assert_eq!(greeter.greet(), "hello");
}

#[test]
fn test_unregister_unknown_key_returns_none() {
    let container = Container::new("unregister");
    assert!(container.unregister_component("missing").is_none());
    assert!(container.get_component_adapter("missing").is_none());
}

#[test]
fn test_container_cannot_contain_itself_or_ancestor() {
    let parent = Container::new("self-parent");
    let child = parent.child("self-child").unwrap();

    assert!(matches!(
        parent.register_child("again", &parent),
        Err(ContainerError::SelfRegistration { .. })
    ));
    assert!(matches!(
        child.register_child("ancestor", &parent),
        Err(ContainerError::SelfRegistration { .. })
    ));

    let sibling = Container::new("self-sibling");
    child.register_child("sibling", &sibling).unwrap();
    assert!(child.get_component_adapter("sibling").is_some());
}

#[test]
fn test_concurrent_registration_of_same_key() {
    let container = Container::new("register-race");
    let barrier = Barrier::new(8);

    let outcomes: Vec<bool> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|index| {
                let container = &container;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    container
                        .register_component_instance(format!("unique-{}", index), Arc::new(index))
                        .unwrap();
                    container
                        .register_component_instance("contested", Arc::new(index))
                        .is_ok()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(outcomes.iter().filter(|won| **won).count(), 1);
    assert_eq!(container.get_component_adapters().len(), 9);
    for index in 0..8 {
        assert!(container
            .get_component_adapter(ComponentKey::named(format!("unique-{}", index)))
            .is_some());
    }
}

struct Plain;

#[tokio::test]
async fn test_disposed_container_rejects_lifecycle_calls() {
    let container = Container::new("disposed");
    container
        .register_definition(
            ComponentDefinition::builder::<Plain>()
                .constructor(|| anyhow::Ok(Plain))
                .build(),
        )
        .unwrap();

    container.start().await.unwrap();
    assert_eq!(container.state(), ContainerState::Started);

    container.dispose().await.unwrap();
    assert_eq!(container.state(), ContainerState::Disposed);
    container.dispose().await.unwrap();

    assert!(matches!(
        container.start().await,
        Err(ContainerError::Disposed { .. })
    ));
    assert!(matches!(
        container.stop().await,
        Err(ContainerError::Disposed { .. })
    ));
}
