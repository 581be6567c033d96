//! Push Inbox - 推送通知接入、本地历史与详情路由

pub mod cli;
pub mod config;
pub mod notification;

pub use config::Config;
pub use notification::{
    DeliveryChannel, DetailView, HandlerRegistry, HistoryStore, IngestionPipeline,
    NotificationRecord, PushCoordinator, RawMessage, Route, RoutingController, SetupOutcome,
    StoreOutcome,
};
