//! # 内核演示程序
//!
//! 从组件声明文件引导一个内核，打印拦截器链、实例化顺序和管理对象名称。

use async_trait::async_trait;
use clap::Parser;
use config_impl::SettingsBinder;
use di_abstractions::{ComponentDefinition, ComponentPlugin};
use di_impl::ComponentCatalog;
use infrastructure_common::{BoxError, Disposable, InitParams, Startable};
use infrastructure_composition::{Kernel, KernelBuilder, LoggingConfig};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "kernel-demo")]
#[command(about = "Lorn Kernel 演示程序")]
struct Args {
    /// 组件声明文件路径
    #[arg(short, long, default_value = "demos/kernel-demo/config/components.toml")]
    config: PathBuf,

    /// 设置文件路径
    #[arg(short, long, default_value = "demos/kernel-demo/config/kernel.toml")]
    settings: PathBuf,

    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,

    /// 启动后等待 Ctrl+C 再关闭
    #[arg(long)]
    wait: bool,
}

/// 内存日志
struct Journal {
    capacity: usize,
    entries: Mutex<Vec<String>>,
}

impl Journal {
    fn append(&self, entry: String) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.remove(0);
        }
        entries.push(entry);
    }
}

#[async_trait]
impl Disposable for Journal {
    async fn dispose(&self) -> Result<(), BoxError> {
        info!("日志组件释放, 共 {} 条记录", self.entries.lock().len());
        Ok(())
    }
}

/// 问候组件
struct Greeter {
    greeting: String,
    signatures: Mutex<Vec<String>>,
    journal: Arc<Journal>,
}

impl Greeter {
    fn greet(&self, name: &str) -> String {
        let signatures = self.signatures.lock().join(", ");
        let message = format!("{}, {}! ({})", self.greeting, name, signatures);
        self.journal.append(message.clone());
        message
    }
}

#[async_trait]
impl Startable for Greeter {
    async fn start(&self) -> Result<(), BoxError> {
        info!("问候组件启动: {}", self.greet("内核"));
        Ok(())
    }

    async fn stop(&self) -> Result<(), BoxError> {
        info!("问候组件停止");
        Ok(())
    }
}

fn catalog() -> ComponentCatalog {
    ComponentCatalog::new()
        .with_definition(
            "Journal",
            ComponentDefinition::builder::<Journal>()
                .constructor(|params: InitParams| {
                    anyhow::Ok(Journal {
                        capacity: params.get::<usize>("capacity")?.unwrap_or(16),
                        entries: Mutex::new(Vec::new()),
                    })
                })
                .disposable()
                .build(),
        )
        .with_definition(
            "Greeter",
            ComponentDefinition::builder::<Greeter>()
                .constructor(|journal: Arc<Journal>, params: InitParams| {
                    anyhow::Ok(Greeter {
                        greeting: params.value_param("greeting").unwrap_or("Hello").to_string(),
                        signatures: Mutex::new(Vec::new()),
                        journal,
                    })
                })
                .startable()
                .build(),
        )
        .with_plugin(
            "Signature",
            ComponentPlugin::new::<Greeter, _>("signature", |greeter, params, _resolver| {
                greeter
                    .signatures
                    .lock()
                    .push(params.require::<String>("value")?);
                Ok(())
            }),
        )
}

async fn build_kernel(args: &Args) -> Result<Kernel, Box<dyn std::error::Error>> {
    let mut builder = KernelBuilder::new()
        .root_name("demo")
        .with_declarations_file(&args.config)
        .with_catalog(catalog())
        .with_settings(
            SettingsBinder::new()
                .with_optional_file(&args.settings)
                .with_env_prefix("KERNEL"),
        );
    if args.verbose {
        builder = builder.with_logging(LoggingConfig::development());
    }
    Ok(builder.build().await?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let kernel = build_kernel(&args).await?;
    kernel.install_global();
    kernel.start().await?;

    let container = kernel.container()?;
    println!("拦截器链: {}", container.interceptor_ids().join(" <- "));

    let order: Vec<String> = container
        .instantiation_order()
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("实例化顺序: {}", order.join(", "));

    let greeter = container.get_component_instance::<Greeter>("greeter")?;
    if let Some(greeter) = greeter {
        println!("{}", greeter.greet("世界"));
    }

    let tenant = container.child("tenant-a")?;
    if let Some(object_name) = tenant.scoping_object_name() {
        println!("子容器管理名称: {}", object_name);
    }
    let journal = tenant.require::<Journal>()?;
    println!("子容器经由父容器解析到日志组件, 记录 {} 条", journal.entries.lock().len());

    if args.wait {
        info!("等待退出信号");
        tokio::signal::ctrl_c().await?;
    }

    kernel.shutdown().await?;
    info!("演示程序结束");
    Ok(())
}
