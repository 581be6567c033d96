//! 推送消息模型 - 传输层交付的原始消息
//!
//! 核心只读取三个可选字段：`data.messageId`、传输层分配的 `messageId`
//! 以及 `notification.title` / `notification.body`，其余内容原样保留。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 应用自定义数据中承载消息 ID 的键
pub const DATA_MESSAGE_ID_KEY: &str = "messageId";

/// 通知展示内容
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// 原始推送消息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    /// 传输层分配的消息 ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// 应用自定义数据
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,
    /// 展示内容
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationContent>,
}

impl RawMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置传输层消息 ID
    pub fn with_transport_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// 设置 `data.messageId`
    pub fn with_data_message_id(mut self, id: impl Into<String>) -> Self {
        self.data.insert(
            DATA_MESSAGE_ID_KEY.to_string(),
            serde_json::Value::String(id.into()),
        );
        self
    }

    /// 设置任意 data 字段
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// 设置标题和正文
    pub fn with_notification(mut self, title: impl Into<String>, body: impl Into<String>) -> Self {
        self.notification = Some(NotificationContent {
            title: Some(title.into()),
            body: Some(body.into()),
        });
        self
    }

    /// `data.messageId` 的字符串形式（空值视为缺失）
    ///
    /// 数字、布尔等非字符串值按 JSON 文本转换，`null` 视为缺失。
    pub fn data_message_id(&self) -> Option<String> {
        let value = self.data.get(DATA_MESSAGE_ID_KEY)?;
        let text = match value {
            serde_json::Value::Null => return None,
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// 传输层消息 ID（空字符串视为缺失）
    pub fn transport_message_id(&self) -> Option<&str> {
        self.message_id.as_deref().filter(|id| !id.is_empty())
    }

    /// 标题（空字符串视为缺失）
    pub fn title(&self) -> Option<&str> {
        self.notification
            .as_ref()
            .and_then(|n| n.title.as_deref())
            .filter(|t| !t.is_empty())
    }

    /// 正文（空字符串视为缺失）
    pub fn body(&self) -> Option<&str> {
        self.notification
            .as_ref()
            .and_then(|n| n.body.as_deref())
            .filter(|b| !b.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transport_payload() {
        let json = r#"{
            "messageId": "0:1700000000%abc",
            "data": {"messageId": "x", "extra": 3},
            "notification": {"title": "T", "body": "B"}
        }"#;
        let raw: RawMessage = serde_json::from_str(json).unwrap();
        assert_eq!(raw.transport_message_id(), Some("0:1700000000%abc"));
        assert_eq!(raw.data_message_id(), Some("x".to_string()));
        assert_eq!(raw.title(), Some("T"));
        assert_eq!(raw.body(), Some("B"));
    }

    #[test]
    fn test_parse_minimal_payload() {
        let raw: RawMessage = serde_json::from_str("{}").unwrap();
        assert!(raw.transport_message_id().is_none());
        assert!(raw.data_message_id().is_none());
        assert!(raw.title().is_none());
        assert!(raw.body().is_none());
    }

    #[test]
    fn test_numeric_data_message_id_is_stringified() {
        let raw = RawMessage::new().with_data(DATA_MESSAGE_ID_KEY, serde_json::json!(12345));
        assert_eq!(raw.data_message_id(), Some("12345".to_string()));
    }

    #[test]
    fn test_empty_and_null_ids_are_absent() {
        let raw = RawMessage::new()
            .with_data_message_id("")
            .with_transport_id("");
        assert!(raw.data_message_id().is_none());
        assert!(raw.transport_message_id().is_none());

        let raw = RawMessage::new().with_data(DATA_MESSAGE_ID_KEY, serde_json::Value::Null);
        assert!(raw.data_message_id().is_none());
    }
}
