//! 推送通知核心 - 接入、持久化与路由
//!
//! # 数据流
//! ```text
//! RawMessage -> identity::resolve_message_id -> {title, body, id}
//!            -> HistoryStore::append -> RoutingController::route -> 跳转/弹框
//! ```
//!
//! # 使用示例
//! ```ignore
//! use push_inbox::notification::*;
//!
//! let store = Arc::new(HistoryStore::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock)));
//! let pipeline = Arc::new(IngestionPipeline::new(store));
//! HandlerRegistry::global().init(pipeline.background_handler())?;
//!
//! let router = Arc::new(RoutingController::new(navigator, presenter));
//! let mut coordinator = PushCoordinator::new(transport, pipeline, router);
//! coordinator.setup();
//! ```

pub mod clock;
pub mod coordinator;
pub mod deep_link;
pub mod identity;
pub mod kv;
pub mod message;
pub mod pipeline;
pub mod registry;
pub mod routing;
pub mod store;
pub mod transport;
pub mod view;

pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{PushCoordinator, SetupOutcome};
pub use deep_link::{DeepLinkResolver, DEFAULT_LINK_PREFIX};
pub use identity::{resolve_message_id, resolve_with_source, IdSource};
pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use message::{NotificationContent, RawMessage};
pub use pipeline::{Ingested, IngestionPipeline, DEFAULT_TITLE};
pub use registry::{BackgroundHandler, HandlerRegistry, ListenerSet, MessageHandler, Subscription};
pub use routing::{
    DeliveryChannel, ForegroundPrompt, LaunchGuard, NavParams, Navigator, PromptChoice,
    PromptPresenter, Route, RouteDecision, RouteOutcome, RoutingController,
};
pub use store::{DuplicatePolicy, HistoryStore, NotificationRecord, StoreOutcome, DEFAULT_STORAGE_KEY};
pub use transport::{PermissionStatus, PushTransport, ScriptedTransport};
pub use view::{render_history, DetailView};
