// src/cli/open.rs
//! Open 命令 - 运行中收到深链，经路由控制器跳转并渲染目标屏幕

use anyhow::{anyhow, Result};
use std::sync::Arc;

use crate::config::Config;
use crate::notification::{Route, RoutingController, SystemClock};

use super::deliver::TerminalPrompt;
use super::output::ConsoleNavigator;

/// 打开深链，返回跳转到的路由；无法识别时返回 `None`
pub fn open_link(config: &Config, url: &str) -> Result<Option<Route>> {
    let store = Arc::new(config.open_store(Arc::new(SystemClock)));
    let router = RoutingController::new(
        Arc::new(ConsoleNavigator::new(store)),
        Arc::new(TerminalPrompt::new(false)),
    )
    .with_links(config.link_resolver()?);
    Ok(router.handle_link(url))
}

/// 处理 open 命令
pub fn handle_open(url: &str, config: &Config) -> Result<()> {
    if open_link(config, url)?.is_some() {
        return Ok(());
    }

    let links = config.link_resolver()?;
    Err(anyhow!(
        "无法识别的深链: {} (支持的格式: {} 或 {})",
        url,
        links.link_for(&Route::History),
        links.link_for(&Route::detail(":messageId"))
    ))
}
