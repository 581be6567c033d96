//! 消息 ID 解析 - 为任意投递渠道的消息生成统一的规范 ID
//!
//! 同一条消息可能先经后台处理器入库、再经用户点击打开，
//! 两条路径必须解析出相同的 ID，才能在详情页找到同一条记录。
//!
//! ## 优先级
//! 1. `data.messageId`（应用自定义，穿透传输层转换）
//! 2. 传输层分配的 `messageId`
//! 3. 当前毫秒时间戳（兜底，同一毫秒内可能冲突）

use super::clock::Clock;
use super::message::RawMessage;
use tracing::debug;

/// 解析出的 ID 来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSource {
    /// `data.messageId`
    Data,
    /// 传输层 ID
    Transport,
    /// 时间戳兜底
    Timestamp,
}

/// 解析规范消息 ID
pub fn resolve_message_id(raw: &RawMessage, clock: &dyn Clock) -> String {
    resolve_with_source(raw, clock).0
}

/// 解析规范消息 ID，并返回其来源
pub fn resolve_with_source(raw: &RawMessage, clock: &dyn Clock) -> (String, IdSource) {
    if let Some(id) = raw.data_message_id() {
        return (id, IdSource::Data);
    }
    if let Some(id) = raw.transport_message_id() {
        return (id.to_string(), IdSource::Transport);
    }
    let fallback = clock.now_millis().to_string();
    debug!(message_id = %fallback, "Message carries no id, falling back to timestamp");
    (fallback, IdSource::Timestamp)
}
