//! 生命周期场景：依赖顺序、逆序停止与销毁、子容器

use async_trait::async_trait;
use di_abstractions::ComponentDefinition;
use di_impl::Container;
use infrastructure_common::{BoxError, ComponentKey, Disposable, Startable};
use parking_lot::Mutex;
use std::sync::Arc;

type Journal = Arc<Mutex<Vec<String>>>;

struct Database {
    journal: Journal,
}

struct Service {
    journal: Journal,
    database: Arc<Database>,
}

macro_rules! recording_lifecycle {
    ($component:ident, $name:literal) => {
        #[async_trait]
        impl Startable for $component {
            async fn start(&self) -> Result<(), BoxError> {
                self.journal.lock().push(concat!("start:", $name).to_string());
                Ok(())
            }

            async fn stop(&self) -> Result<(), BoxError> {
                self.journal.lock().push(concat!("stop:", $name).to_string());
                Ok(())
            }
        }

        #[async_trait]
        impl Disposable for $component {
            async fn dispose(&self) -> Result<(), BoxError> {
                self.journal.lock().push(concat!("dispose:", $name).to_string());
                Ok(())
            }
        }
    };
}

recording_lifecycle!(Database, "database");
recording_lifecycle!(Service, "service");

fn register(container: &Container, journal: &Journal) {
    let service_journal = Arc::clone(journal);
    container
        .register_definition(
            ComponentDefinition::builder::<Service>()
                .constructor(move |database: Arc<Database>| {
                    anyhow::Ok(Service {
                        journal: Arc::clone(&service_journal),
                        database,
                    })
                })
                .startable()
                .disposable()
                .build(),
        )
        .unwrap();

    let database_journal = Arc::clone(journal);
    container
        .register_definition(
            ComponentDefinition::builder::<Database>()
                .constructor(move || {
                    anyhow::Ok(Database {
                        journal: Arc::clone(&database_journal),
                    })
                })
                .startable()
                .disposable()
                .build(),
        )
        .unwrap();
}

#[tokio::test]
async fn test_dependencies_start_first_and_stop_last() {
    let journal: Journal = Arc::default();
    let container = Container::new("ordering");
    register(&container, &journal);

    container.start().await.unwrap();

    let service = container.require::<Service>().unwrap();
    let database = container.require::<Database>().unwrap();
    assert!(Arc::ptr_eq(&service.database, &database));
    assert_eq!(
        container.instantiation_order(),
        vec![ComponentKey::of::<Database>(), ComponentKey::of::<Service>()]
    );

    container.dispose().await.unwrap();

    assert_eq!(
        *journal.lock(),
        vec![
            "start:database",
            "start:service",
            "stop:service",
            "stop:database",
            "dispose:service",
            "dispose:database",
        ]
    );
}

#[tokio::test]
async fn test_stop_only_reaches_instantiated_components() {
    let journal: Journal = Arc::default();
    let container = Container::new("lazy");
    register(&container, &journal);

    container.require::<Database>().unwrap();
    container.dispose().await.unwrap();

    assert_eq!(*journal.lock(), vec!["dispose:database"]);
}

#[tokio::test]
async fn test_child_components_run_inside_parent_phases() {
    let journal: Journal = Arc::default();
    let parent = Container::new("lifecycle-parent");
    let child = parent.child("lifecycle-child").unwrap();
    register(&child, &journal);

    parent.start().await.unwrap();
    assert_eq!(*journal.lock(), vec!["start:database", "start:service"]);

    parent.stop().await.unwrap();
    assert_eq!(journal.lock().len(), 4);
    assert_eq!(journal.lock()[2], "stop:service");
}
