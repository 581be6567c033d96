//! 推送传输层边界
//!
//! 核心只消费这些原语：权限请求、token 获取、前台/打开监听、冷启动查询。
//! 后台渠道不走这里，而是进程级 [`HandlerRegistry`]。
//! [`ScriptedTransport`] 是本地实现：CLI 和测试用它模拟原生 SDK 的投递。

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use super::message::RawMessage;
use super::registry::{HandlerRegistry, ListenerSet, MessageHandler, Subscription};
use super::store::StoreOutcome;

/// 通知权限状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Authorized,
    Provisional,
    Denied,
    NotDetermined,
}

impl PermissionStatus {
    /// 已授权或临时授权都算通过
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionStatus::Authorized | PermissionStatus::Provisional)
    }
}

/// 推送传输层
pub trait PushTransport: Send + Sync {
    /// 请求通知权限
    fn request_permission(&self) -> Result<PermissionStatus>;

    /// 获取设备 token
    fn token(&self) -> Result<Option<String>>;

    /// 注册前台消息监听
    fn on_message(&self, handler: MessageHandler) -> Subscription;

    /// 注册"通知从后台打开应用"监听
    fn on_notification_opened(&self, handler: MessageHandler) -> Subscription;

    /// 应用是否由通知冷启动，是则返回该消息
    fn initial_notification(&self) -> Result<Option<RawMessage>>;
}

/// 可编排的本地传输层
pub struct ScriptedTransport {
    permission: Mutex<PermissionStatus>,
    token: Mutex<Option<String>>,
    token_error: Mutex<Option<String>>,
    initial: Mutex<Option<RawMessage>>,
    foreground: ListenerSet,
    opened: ListenerSet,
    registry: Arc<HandlerRegistry>,
}

impl ScriptedTransport {
    /// 使用进程级后台注册表
    pub fn new() -> Self {
        Self::with_registry(HandlerRegistry::global())
    }

    /// 使用指定的后台注册表（测试隔离用）
    pub fn with_registry(registry: Arc<HandlerRegistry>) -> Self {
        Self {
            permission: Mutex::new(PermissionStatus::Authorized),
            token: Mutex::new(None),
            token_error: Mutex::new(None),
            initial: Mutex::new(None),
            foreground: ListenerSet::new(),
            opened: ListenerSet::new(),
            registry,
        }
    }

    pub fn set_permission(&self, status: PermissionStatus) {
        *self.permission.lock().unwrap_or_else(|e| e.into_inner()) = status;
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = token;
    }

    /// 让 token 获取失败
    pub fn fail_token(&self, reason: impl Into<String>) {
        *self.token_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(reason.into());
    }

    /// 设置冷启动消息（只能被查询到一次）
    pub fn set_initial_notification(&self, raw: RawMessage) {
        *self.initial.lock().unwrap_or_else(|e| e.into_inner()) = Some(raw);
    }

    /// 前台投递，返回处理的监听器数量
    pub fn deliver_foreground(&self, raw: RawMessage) -> usize {
        self.foreground.emit(&raw)
    }

    /// 从后台点击打开，返回处理的监听器数量
    pub fn open_from_background(&self, raw: RawMessage) -> usize {
        self.opened.emit(&raw)
    }

    /// 后台投递（交给进程级处理器），未注册处理器时返回 `None`
    pub fn deliver_background(&self, raw: RawMessage) -> Option<StoreOutcome> {
        self.registry.dispatch(raw)
    }

    pub fn foreground_listener_count(&self) -> usize {
        self.foreground.len()
    }

    pub fn opened_listener_count(&self) -> usize {
        self.opened.len()
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl PushTransport for ScriptedTransport {
    fn request_permission(&self) -> Result<PermissionStatus> {
        Ok(*self.permission.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn token(&self) -> Result<Option<String>> {
        if let Some(reason) = self.token_error.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(anyhow!(reason));
        }
        Ok(self.token.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn on_message(&self, handler: MessageHandler) -> Subscription {
        self.foreground.subscribe(handler)
    }

    fn on_notification_opened(&self, handler: MessageHandler) -> Subscription {
        self.opened.subscribe(handler)
    }

    fn initial_notification(&self) -> Result<Option<RawMessage>> {
        Ok(self.initial.lock().unwrap_or_else(|e| e.into_inner()).take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_granted_states() {
        assert!(PermissionStatus::Authorized.is_granted());
        assert!(PermissionStatus::Provisional.is_granted());
        assert!(!PermissionStatus::Denied.is_granted());
        assert!(!PermissionStatus::NotDetermined.is_granted());
    }

    #[test]
    fn test_initial_notification_reported_once() {
        let transport = ScriptedTransport::with_registry(Arc::new(HandlerRegistry::new()));
        transport.set_initial_notification(RawMessage::new().with_transport_id("a"));

        assert!(transport.initial_notification().unwrap().is_some());
        assert!(transport.initial_notification().unwrap().is_none());
    }

    #[test]
    fn test_token_failure() {
        let transport = ScriptedTransport::with_registry(Arc::new(HandlerRegistry::new()));
        transport.set_token(Some("tok".to_string()));
        assert_eq!(transport.token().unwrap().as_deref(), Some("tok"));

        transport.fail_token("offline");
        assert!(transport.token().is_err());
    }

    #[test]
    fn test_background_without_handler_is_dropped() {
        let transport = ScriptedTransport::with_registry(Arc::new(HandlerRegistry::new()));
        assert_eq!(transport.deliver_background(RawMessage::new()), None);
    }
}
