// src/cli/output.rs
//! 终端输出 - JSON/文本格式化，以及把导航请求渲染成屏幕内容

use serde::Serialize;
use std::sync::Arc;

use crate::notification::{
    render_history, DetailView, HistoryStore, NavParams, Navigator, StoreOutcome,
};

/// 按 --json 输出 JSON，否则输出文本
pub fn format_output<T: Serialize>(data: &T, json: bool, text: impl FnOnce(&T) -> String) -> String {
    if json {
        serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
    } else {
        text(data)
    }
}

/// 屏幕标题
pub fn screen_title(screen: &str) -> &'static str {
    match screen {
        "History" => "Messages",
        "MessageDetail" => "Message Detail",
        _ => "Unknown",
    }
}

/// 渲染一个屏幕
pub fn render_screen(store: &HistoryStore, screen: &str, params: &NavParams) -> String {
    let content = match (screen, params.message_id.as_deref()) {
        ("MessageDetail", Some(id)) => DetailView::lookup(store, id).render(),
        ("MessageDetail", None) => DetailView::lookup(store, "").render(),
        _ => render_history(&store.list()),
    };
    format!("== {} ==\n{}", screen_title(screen), content)
}

/// 终端导航器：每次跳转把目标屏幕打印到 stdout
pub struct ConsoleNavigator {
    store: Arc<HistoryStore>,
}

impl ConsoleNavigator {
    pub fn new(store: Arc<HistoryStore>) -> Self {
        Self { store }
    }
}

impl Navigator for ConsoleNavigator {
    fn navigate(&self, screen: &str, params: &NavParams) {
        println!("{}\n", render_screen(&self.store, screen, params));
    }
}

/// 把入库结果转换为一行状态描述
pub fn describe_store_outcome(outcome: &StoreOutcome) -> String {
    match outcome {
        StoreOutcome::Written(record) => format!("saved: {} ({})", record.title, record.message_id),
        StoreOutcome::Cleared => "cleared".to_string(),
        StoreOutcome::Skipped(reason) => format!("skipped: {}", reason),
        StoreOutcome::Failed(reason) => format!("failed: {}", reason),
    }
}
