//! 推送协调器 - 挂载导航树时完成权限、token、监听器和冷启动检查
//!
//! ## 流程
//! 1. 请求权限，拒绝则停止（不取 token、不注册监听器）
//! 2. 获取 token（失败只记录日志）
//! 3. 注册前台监听器：入库 -> 弹框
//! 4. 注册打开监听器：解析 ID -> 直接跳转
//! 5. 检查冷启动通知：解析 ID -> 通过一次性标记跳转
//!
//! 卸载时调用 `teardown()`（或直接 drop）注销监听器。

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::message::RawMessage;
use super::pipeline::IngestionPipeline;
use super::registry::{MessageHandler, Subscription};
use super::routing::{DeliveryChannel, Route, RouteOutcome, RoutingController};
use super::transport::PushTransport;

/// 挂载结果
#[derive(Debug, Clone, PartialEq)]
pub enum SetupOutcome {
    /// 监听器已就绪
    Ready {
        token: Option<String>,
        /// 冷启动通知导致的跳转
        launch_route: Option<Route>,
    },
    /// 用户拒绝通知权限
    PermissionDenied,
    /// 传输层出错
    Failed(String),
}

/// 推送协调器
pub struct PushCoordinator {
    transport: Arc<dyn PushTransport>,
    pipeline: Arc<IngestionPipeline>,
    router: Arc<RoutingController>,
    subscriptions: Vec<Subscription>,
}

impl PushCoordinator {
    pub fn new(
        transport: Arc<dyn PushTransport>,
        pipeline: Arc<IngestionPipeline>,
        router: Arc<RoutingController>,
    ) -> Self {
        Self {
            transport,
            pipeline,
            router,
            subscriptions: Vec::new(),
        }
    }

    pub fn router(&self) -> &Arc<RoutingController> {
        &self.router
    }

    pub fn pipeline(&self) -> &Arc<IngestionPipeline> {
        &self.pipeline
    }

    /// 是否已挂载监听器
    pub fn is_mounted(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    /// 挂载
    pub fn setup(&mut self) -> SetupOutcome {
        if self.is_mounted() {
            debug!("Push listeners already mounted, remounting");
            self.teardown();
        }

        match self.transport.request_permission() {
            Ok(status) if status.is_granted() => {}
            Ok(status) => {
                info!(status = ?status, "Push notification permission denied");
                return SetupOutcome::PermissionDenied;
            }
            Err(e) => {
                error!(error = %e, "Error requesting notification permission");
                return SetupOutcome::Failed(e.to_string());
            }
        }

        let token = match self.transport.token() {
            Ok(token) => {
                if let Some(token) = &token {
                    info!(token = %token, "Push token obtained");
                }
                token
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch push token");
                None
            }
        };

        let foreground = self.channel_handler(DeliveryChannel::Foreground);
        self.subscriptions.push(self.transport.on_message(foreground));

        let opened = self.channel_handler(DeliveryChannel::Opened);
        self.subscriptions
            .push(self.transport.on_notification_opened(opened));

        let launch_route = match self.transport.initial_notification() {
            Ok(Some(raw)) => self.handle(DeliveryChannel::Launch, &raw).navigated,
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to query initial notification");
                None
            }
        };

        SetupOutcome::Ready {
            token,
            launch_route,
        }
    }

    /// 冷启动深链入口（与初始通知检查共享一次性标记）
    pub fn handle_launch_link(&self, url: &str) -> RouteOutcome {
        self.router.handle_launch_link(url)
    }

    /// 单条消息：先入库（如需要），再路由
    pub fn handle(&self, channel: DeliveryChannel, raw: &RawMessage) -> RouteOutcome {
        handle_message(&self.pipeline, &self.router, channel, raw)
    }

    /// 卸载，注销所有监听器
    pub fn teardown(&mut self) {
        if self.subscriptions.is_empty() {
            return;
        }
        for mut subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        debug!("Push listeners unmounted");
    }

    fn channel_handler(&self, channel: DeliveryChannel) -> MessageHandler {
        let pipeline = Arc::clone(&self.pipeline);
        let router = Arc::clone(&self.router);
        Arc::new(move |raw: RawMessage| {
            handle_message(&pipeline, &router, channel, &raw);
        })
    }
}

impl Drop for PushCoordinator {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn handle_message(
    pipeline: &IngestionPipeline,
    router: &RoutingController,
    channel: DeliveryChannel,
    raw: &RawMessage,
) -> RouteOutcome {
    let ingested = pipeline.ingest(channel, raw);
    router.route(channel, &ingested)
}
