// src/cli/context.rs
//! 进程上下文 - 存储、管道、后台处理器、本地传输层和协调器的组装

use anyhow::{Context as _, Result};
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::notification::{
    HandlerRegistry, PromptPresenter, PushCoordinator, RoutingController, ScriptedTransport,
    SystemClock,
};

use super::output::ConsoleNavigator;

/// 进程上下文
pub struct AppContext {
    pub transport: Arc<ScriptedTransport>,
    pub coordinator: PushCoordinator,
    registry: Arc<HandlerRegistry>,
}

impl AppContext {
    /// 组装上下文，并在进程级注册表中登记后台处理器
    pub fn bootstrap(config: Config, presenter: Arc<dyn PromptPresenter>) -> Result<Self> {
        Self::with_registry(config, presenter, HandlerRegistry::global())
    }

    /// 使用指定的后台注册表组装上下文
    pub fn with_registry(
        config: Config,
        presenter: Arc<dyn PromptPresenter>,
        registry: Arc<HandlerRegistry>,
    ) -> Result<Self> {
        let links = config.link_resolver()?;
        let store = Arc::new(config.open_store(Arc::new(SystemClock)));
        let pipeline = Arc::new(config.pipeline(store.clone()));

        registry
            .init(pipeline.background_handler())
            .context("background handler must be registered once per process")?;

        let transport = Arc::new(ScriptedTransport::with_registry(registry.clone()));
        let navigator = Arc::new(ConsoleNavigator::new(store));
        let router = Arc::new(RoutingController::new(navigator, presenter).with_links(links));
        let coordinator = PushCoordinator::new(transport.clone(), pipeline, router);

        debug!(data_dir = %config.data_dir.display(), "Push context ready");
        Ok(Self {
            transport,
            coordinator,
            registry,
        })
    }

    /// 卸载监听器并注销后台处理器
    pub fn shutdown(mut self) {
        self.coordinator.teardown();
        self.registry.shutdown();
    }
}
