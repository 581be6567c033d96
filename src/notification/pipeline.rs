//! 接入管道 - 把三种投递渠道的原始消息规范化并入库
//!
//! 前台和后台渠道：解析 ID -> 补全标题/正文 -> 入库，全部完成后才交给路由。
//! 打开/冷启动渠道：消息已由原渠道入库，这里只解析 ID。

use std::sync::Arc;
use tracing::{debug, info};

use super::clock::Clock;
use super::identity::resolve_message_id;
use super::message::RawMessage;
use super::registry::BackgroundHandler;
use super::routing::DeliveryChannel;
use super::store::{HistoryStore, StoreOutcome};

/// 缺失标题时的占位文本
pub const DEFAULT_TITLE: &str = "New Notification";

/// 规范化后的消息
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    pub message_id: String,
    pub title: String,
    pub body: String,
    /// 入库结果（仅前台/后台渠道）
    pub stored: Option<StoreOutcome>,
}

/// 接入管道
pub struct IngestionPipeline {
    store: Arc<HistoryStore>,
    clock: Arc<dyn Clock>,
    default_title: String,
}

impl IngestionPipeline {
    pub fn new(store: Arc<HistoryStore>) -> Self {
        let clock = store.clock().clone();
        Self {
            store,
            clock,
            default_title: DEFAULT_TITLE.to_string(),
        }
    }

    /// 设置占位标题
    pub fn with_default_title(mut self, title: impl Into<String>) -> Self {
        self.default_title = title.into();
        self
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    /// 规范化消息，需要时入库
    pub fn ingest(&self, channel: DeliveryChannel, raw: &RawMessage) -> Ingested {
        let message_id = resolve_message_id(raw, self.clock.as_ref());
        let title = raw.title().unwrap_or(&self.default_title).to_string();
        let body = raw.body().unwrap_or_default().to_string();

        let stored = if channel.persists() {
            info!(channel = %channel, message_id = %message_id, "Push message received");
            Some(self.store.append(&title, &body, &message_id))
        } else {
            info!(channel = %channel, message_id = %message_id, "App opened by notification");
            None
        };

        Ingested {
            message_id,
            title,
            body,
            stored,
        }
    }

    /// 后台渠道处理器（注册到进程级 [`HandlerRegistry`](super::registry::HandlerRegistry)）
    pub fn background_handler(self: &Arc<Self>) -> BackgroundHandler {
        let pipeline = Arc::clone(self);
        Arc::new(move |raw: RawMessage| {
            let ingested = pipeline.ingest(DeliveryChannel::Background, &raw);
            debug!(message_id = %ingested.message_id, stored = ?ingested.stored, "Background message handled");
            // 后台渠道总会入库
            ingested
                .stored
                .unwrap_or_else(|| StoreOutcome::Skipped("channel does not persist".to_string()))
        })
    }
}
