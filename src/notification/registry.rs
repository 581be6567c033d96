//! 处理器注册表 - 监听器订阅与进程级后台处理器
//!
//! - [`ListenerSet`]：前台/打开监听器集合，注册返回 [`Subscription`]，
//!   drop 或 `unsubscribe()` 即注销，避免重复挂载导致重复处理。
//! - [`HandlerRegistry`]：后台渠道的唯一处理器，进程启动时 `init()`，
//!   与任何界面的挂载/卸载无关，退出前 `shutdown()`。

use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use tracing::{debug, info, warn};

use super::message::RawMessage;
use super::store::StoreOutcome;

/// 消息处理器
pub type MessageHandler = Arc<dyn Fn(RawMessage) + Send + Sync>;

/// 后台处理器，返回入库结果
pub type BackgroundHandler = Arc<dyn Fn(RawMessage) -> StoreOutcome + Send + Sync>;

#[derive(Default)]
struct Slots {
    next_id: u64,
    handlers: BTreeMap<u64, MessageHandler>,
}

/// 监听器集合
#[derive(Clone, Default)]
pub struct ListenerSet {
    slots: Arc<Mutex<Slots>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册监听器
    pub fn subscribe(&self, handler: MessageHandler) -> Subscription {
        let id = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            let id = slots.next_id;
            slots.next_id += 1;
            slots.handlers.insert(id, handler);
            id
        };

        let weak: Weak<Mutex<Slots>> = Arc::downgrade(&self.slots);
        Subscription::new(move || {
            if let Some(slots) = weak.upgrade() {
                let mut slots = slots.lock().unwrap_or_else(|e| e.into_inner());
                slots.handlers.remove(&id);
            }
        })
    }

    /// 分发给所有监听器，返回调用数量
    pub fn emit(&self, raw: &RawMessage) -> usize {
        // 锁外调用，允许处理器内部再注册/注销
        let handlers: Vec<MessageHandler> = {
            let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.handlers.values().cloned().collect()
        };
        for handler in &handlers {
            handler(raw.clone());
        }
        handlers.len()
    }

    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .handlers
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 订阅句柄，drop 时自动注销
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// 注销（幂等）
    pub fn unsubscribe(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

static GLOBAL_REGISTRY: OnceLock<Arc<HandlerRegistry>> = OnceLock::new();

/// 后台处理器注册表
#[derive(Default)]
pub struct HandlerRegistry {
    handler: Mutex<Option<BackgroundHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 进程级单例
    pub fn global() -> Arc<HandlerRegistry> {
        GLOBAL_REGISTRY
            .get_or_init(|| Arc::new(HandlerRegistry::new()))
            .clone()
    }

    /// 注册后台处理器，已注册时报错
    pub fn init(&self, handler: BackgroundHandler) -> Result<()> {
        let mut slot = self.handler.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return Err(anyhow!("background handler already registered"));
        }
        *slot = Some(handler);
        info!("Background message handler registered");
        Ok(())
    }

    /// 注销后台处理器，返回之前是否已注册
    pub fn shutdown(&self) -> bool {
        let previous = self
            .handler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if previous.is_some() {
            info!("Background message handler unregistered");
        }
        previous.is_some()
    }

    pub fn is_initialized(&self) -> bool {
        self.handler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// 把后台消息交给处理器，未注册时丢弃并返回 `None`
    pub fn dispatch(&self, raw: RawMessage) -> Option<StoreOutcome> {
        let handler = self
            .handler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match handler {
            Some(handler) => {
                debug!("Dispatching background message");
                Some(handler(raw))
            }
            None => {
                warn!("No background handler registered, message dropped");
                None
            }
        }
    }
}
