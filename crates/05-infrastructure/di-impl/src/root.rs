//! 根容器
//!
//! 进程级唯一的顶层容器。读取走无锁快路径；首次构建在锁内再次检查，
//! 构建期间同一调用栈再次进入会立即得到 [`ContainerError::AlreadyBooting`]。

use crate::container::Container;
use arc_swap::ArcSwapOption;
use infrastructure_common::{ContainerError, ContainerResult};
use once_cell::sync::Lazy;
use parking_lot::{ReentrantMutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

type Bootstrapper = Box<dyn Fn() -> ContainerResult<Container> + Send + Sync>;

static GLOBAL: Lazy<RwLock<Option<Arc<RootContainer>>>> = Lazy::new(|| RwLock::new(None));

/// 根容器
pub struct RootContainer {
    current: ArcSwapOption<Container>,
    boot_lock: ReentrantMutex<()>,
    booting: AtomicBool,
    bootstrapper: Bootstrapper,
}

struct BootingGuard<'a>(&'a AtomicBool);

impl Drop for BootingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl RootContainer {
    /// 以构建函数创建，容器在第一次 [`get`](Self::get) 时构建
    pub fn new<F>(bootstrapper: F) -> Self
    where
        F: Fn() -> ContainerResult<Container> + Send + Sync + 'static,
    {
        Self {
            current: ArcSwapOption::empty(),
            boot_lock: ReentrantMutex::new(()),
            booting: AtomicBool::new(false),
            bootstrapper: Box::new(bootstrapper),
        }
    }

    /// 获取根容器，必要时构建
    pub fn get(&self) -> ContainerResult<Container> {
        if let Some(container) = self.current.load_full() {
            return Ok((*container).clone());
        }

        let _lock = self.boot_lock.lock();
        if let Some(container) = self.current.load_full() {
            return Ok((*container).clone());
        }
        if self.booting.swap(true, Ordering::AcqRel) {
            error!("根容器构建过程中再次请求根容器");
            return Err(ContainerError::AlreadyBooting);
        }
        let _booting = BootingGuard(&self.booting);

        info!("构建根容器");
        let started = Instant::now();
        let container = (self.bootstrapper)()?;
        self.current.store(Some(Arc::new(container.clone())));
        info!(
            "根容器构建完成: {}, 耗时 {:?}",
            container.name(),
            started.elapsed()
        );
        Ok(container)
    }

    /// 是否已构建
    pub fn is_booted(&self) -> bool {
        self.current.load().is_some()
    }

    /// 当前根容器，不触发构建
    pub fn current(&self) -> Option<Container> {
        self.current
            .load_full()
            .map(|container| (*container).clone())
    }

    /// 取下并销毁根容器，之后的 [`get`](Self::get) 会重新构建
    pub async fn shutdown(&self) -> ContainerResult<()> {
        let Some(container) = self.current.swap(None) else {
            return Ok(());
        };
        info!("关闭根容器: {}", container.name());
        container.dispose().await
    }

    /// 安装为进程级根容器，返回之前安装的实例
    pub fn install_global(root: Arc<RootContainer>) -> Option<Arc<RootContainer>> {
        GLOBAL.write().replace(root)
    }

    /// 进程级根容器
    pub fn global() -> Option<Arc<RootContainer>> {
        GLOBAL.read().clone()
    }

    /// 卸下进程级根容器
    pub fn uninstall_global() -> Option<Arc<RootContainer>> {
        GLOBAL.write().take()
    }
}

impl fmt::Debug for RootContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootContainer")
            .field("current", &self.current())
            .field("booting", &self.booting.load(Ordering::Acquire))
            .field("bootstrapper", &"<function>")
            .finish()
    }
}
