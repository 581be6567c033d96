//! 通知历史存储 - 单键 JSON 数组，最新在前
//!
//! 持久化布局：一个键保存 `[{title, body, timestamp, messageId}, ...]`。
//! 所有操作都返回 [`StoreOutcome`]，失败会记录日志但不会向上抛出。
//! 读-改-写在进程内由单写者互斥锁串行化，跨进程由后端的 `update` 保证原子性。

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::kv::KeyValueStore;

/// 默认集合键
pub const DEFAULT_STORAGE_KEY: &str = "@notifications";

/// 通知记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    /// 标题
    pub title: String,
    /// 正文
    pub body: String,
    /// 入库时间（毫秒）
    pub timestamp: i64,
    /// 规范消息 ID
    pub message_id: String,
}

/// 重复 ID 的写入策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// 每次投递都是独立事件，总是追加
    #[default]
    AppendAlways,
    /// 已存在相同 messageId 时跳过写入
    DedupOnWrite,
}

/// 存储操作结果
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOutcome {
    /// 已写入
    Written(NotificationRecord),
    /// 已清空
    Cleared,
    /// 跳过（例如重复 ID）
    Skipped(String),
    /// 失败（已记录日志）
    Failed(String),
}

impl StoreOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, StoreOutcome::Failed(_))
    }
}

/// 通知历史存储
pub struct HistoryStore {
    backend: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    key: String,
    duplicate_policy: DuplicatePolicy,
    max_records: Option<usize>,
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            key: DEFAULT_STORAGE_KEY.to_string(),
            duplicate_policy: DuplicatePolicy::default(),
            max_records: None,
            write_lock: Mutex::new(()),
        }
    }

    /// 设置集合键
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// 设置重复 ID 策略
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// 设置保留上限（超出时丢弃最旧的记录）
    pub fn with_max_records(mut self, max: Option<usize>) -> Self {
        self.max_records = max;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// 追加一条记录（头插）
    pub fn append(&self, title: &str, body: &str, message_id: &str) -> StoreOutcome {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut outcome = StoreOutcome::Skipped(String::new());
        let result = self.backend.update(&self.key, &mut |current| {
            let mut records = match current {
                Some(payload) => self.parse_or_empty(&payload),
                None => Vec::new(),
            };

            if self.duplicate_policy == DuplicatePolicy::DedupOnWrite
                && records.iter().any(|r| r.message_id == message_id)
            {
                outcome = StoreOutcome::Skipped(format!("duplicate messageId {}", message_id));
                return None;
            }

            let record = NotificationRecord {
                title: title.to_string(),
                body: body.to_string(),
                timestamp: self.clock.now_millis(),
                message_id: message_id.to_string(),
            };
            records.insert(0, record.clone());
            if let Some(max) = self.max_records {
                records.truncate(max);
            }

            match serde_json::to_string(&records) {
                Ok(payload) => {
                    outcome = StoreOutcome::Written(record);
                    Some(payload)
                }
                Err(e) => {
                    outcome = StoreOutcome::Failed(e.to_string());
                    None
                }
            }
        });

        if let Err(e) = result {
            warn!(key = %self.key, message_id = %message_id, error = %e, "Failed to save notification");
            return StoreOutcome::Failed(e.to_string());
        }
        match &outcome {
            StoreOutcome::Written(record) => {
                info!(message_id = %record.message_id, timestamp = record.timestamp, "Notification saved");
            }
            StoreOutcome::Skipped(reason) => {
                debug!(message_id = %message_id, reason = %reason, "Notification not stored");
            }
            StoreOutcome::Failed(reason) => {
                warn!(message_id = %message_id, error = %reason, "Failed to encode notification history");
            }
            StoreOutcome::Cleared => {}
        }
        outcome
    }

    /// 读取全部记录（最新在前），任何失败都返回空列表
    pub fn list(&self) -> Vec<NotificationRecord> {
        match self.backend.get(&self.key) {
            Ok(Some(payload)) => self.parse_or_empty(&payload),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read notification history");
                Vec::new()
            }
        }
    }

    /// 按 ID 查找最新的一条记录
    pub fn find(&self, message_id: &str) -> Option<NotificationRecord> {
        self.list().into_iter().find(|r| r.message_id == message_id)
    }

    /// 清空整个集合
    pub fn clear(&self) -> StoreOutcome {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        match self.backend.remove(&self.key) {
            Ok(()) => {
                info!(key = %self.key, "All notifications cleared");
                StoreOutcome::Cleared
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to clear notifications");
                StoreOutcome::Failed(e.to_string())
            }
        }
    }

    fn parse_or_empty(&self, payload: &str) -> Vec<NotificationRecord> {
        match serde_json::from_str(payload) {
            Ok(records) => records,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Notification history is unparseable, treating as empty");
                Vec::new()
            }
        }
    }
}
