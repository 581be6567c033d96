//! 路由控制器 - 按投递渠道决定如何进入详情页
//!
//! | 渠道 | 行为 |
//! |---|---|
//! | 前台 | 弹出选择框：View -> 详情页，OK -> 不跳转 |
//! | 后台（未点击） | 只入库，不跳转 |
//! | 后台点击打开 | 直接跳转 |
//! | 冷启动 | 直接跳转，与深链共享一次性 [`LaunchGuard`] |

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::deep_link::DeepLinkResolver;
use super::pipeline::Ingested;

/// 投递渠道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryChannel {
    /// 应用在前台时收到
    Foreground,
    /// 应用不在前台（含被杀死）时由后台处理器收到
    Background,
    /// 从后台点击通知打开应用
    Opened,
    /// 点击通知冷启动应用
    Launch,
}

impl DeliveryChannel {
    /// 该渠道是否需要入库
    pub fn persists(&self) -> bool {
        matches!(self, DeliveryChannel::Foreground | DeliveryChannel::Background)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryChannel::Foreground => "foreground",
            DeliveryChannel::Background => "background",
            DeliveryChannel::Opened => "opened",
            DeliveryChannel::Launch => "launch",
        }
    }
}

impl std::fmt::Display for DeliveryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DeliveryChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "foreground" => Ok(DeliveryChannel::Foreground),
            "background" => Ok(DeliveryChannel::Background),
            "opened" => Ok(DeliveryChannel::Opened),
            "launch" => Ok(DeliveryChannel::Launch),
            other => Err(format!("unknown delivery channel: {}", other)),
        }
    }
}

/// 路由目标
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "screen")]
pub enum Route {
    History,
    MessageDetail {
        #[serde(rename = "messageId")]
        message_id: String,
    },
}

impl Route {
    pub fn detail(message_id: impl Into<String>) -> Self {
        Route::MessageDetail {
            message_id: message_id.into(),
        }
    }

    pub fn screen_name(&self) -> &'static str {
        match self {
            Route::History => "History",
            Route::MessageDetail { .. } => "MessageDetail",
        }
    }

    pub fn params(&self) -> NavParams {
        match self {
            Route::History => NavParams::default(),
            Route::MessageDetail { message_id } => NavParams {
                message_id: Some(message_id.clone()),
            },
        }
    }
}

/// 导航参数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavParams {
    #[serde(rename = "messageId", default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// 导航组件边界
pub trait Navigator: Send + Sync {
    fn navigate(&self, screen: &str, params: &NavParams);
}

/// 前台弹框的"查看"按钮
pub const VIEW_ACTION: &str = "View";
/// 前台弹框的取消按钮（默认）
pub const DISMISS_ACTION: &str = "OK";

/// 前台弹框
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundPrompt {
    pub title: String,
    pub body: String,
    pub message_id: String,
}

impl ForegroundPrompt {
    /// 按钮顺序：View, OK
    pub fn actions(&self) -> [&'static str; 2] {
        [VIEW_ACTION, DISMISS_ACTION]
    }
}

/// 用户选择
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChoice {
    View,
    Dismiss,
}

/// 弹框 UI 边界
pub trait PromptPresenter: Send + Sync {
    fn present(&self, prompt: &ForegroundPrompt) -> PromptChoice;
}

/// 路由决策
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// 直接跳转
    Navigate(Route),
    /// 询问用户
    Prompt(ForegroundPrompt),
    /// 不跳转
    Stay,
    /// 冷启动通知已由另一条路径处理
    AlreadyHandled,
}

/// 路由执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOutcome {
    pub decision: RouteDecision,
    /// 实际跳转到的路由
    pub navigated: Option<Route>,
}

/// 冷启动一次性标记：深链和初始通知检查谁先到谁处理
#[derive(Debug, Default)]
pub struct LaunchGuard {
    claimed: AtomicBool,
}

impl LaunchGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// 尝试占用，只有第一次调用返回 `true`
    pub fn try_claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }
}

/// 路由控制器
pub struct RoutingController {
    navigator: Arc<dyn Navigator>,
    presenter: Arc<dyn PromptPresenter>,
    links: DeepLinkResolver,
    launch_guard: LaunchGuard,
}

impl RoutingController {
    pub fn new(navigator: Arc<dyn Navigator>, presenter: Arc<dyn PromptPresenter>) -> Self {
        Self {
            navigator,
            presenter,
            links: DeepLinkResolver::default(),
            launch_guard: LaunchGuard::new(),
        }
    }

    /// 设置深链解析器
    pub fn with_links(mut self, links: DeepLinkResolver) -> Self {
        self.links = links;
        self
    }

    pub fn links(&self) -> &DeepLinkResolver {
        &self.links
    }

    pub fn launch_guard(&self) -> &LaunchGuard {
        &self.launch_guard
    }

    /// 计算路由决策（冷启动渠道会占用 [`LaunchGuard`]）
    pub fn decide(&self, channel: DeliveryChannel, ingested: &Ingested) -> RouteDecision {
        match channel {
            DeliveryChannel::Foreground => RouteDecision::Prompt(ForegroundPrompt {
                title: ingested.title.clone(),
                body: ingested.body.clone(),
                message_id: ingested.message_id.clone(),
            }),
            DeliveryChannel::Background => RouteDecision::Stay,
            DeliveryChannel::Opened => RouteDecision::Navigate(Route::detail(&ingested.message_id)),
            DeliveryChannel::Launch => {
                if self.launch_guard.try_claim() {
                    RouteDecision::Navigate(Route::detail(&ingested.message_id))
                } else {
                    debug!(message_id = %ingested.message_id, "Launch notification already routed");
                    RouteDecision::AlreadyHandled
                }
            }
        }
    }

    /// 执行决策的副作用（跳转或弹框）
    pub fn apply(&self, decision: &RouteDecision) -> Option<Route> {
        match decision {
            RouteDecision::Navigate(route) => {
                self.go(route);
                Some(route.clone())
            }
            RouteDecision::Prompt(prompt) => match self.presenter.present(prompt) {
                PromptChoice::View => {
                    let route = Route::detail(&prompt.message_id);
                    self.go(&route);
                    Some(route)
                }
                PromptChoice::Dismiss => {
                    debug!(message_id = %prompt.message_id, "Foreground prompt dismissed");
                    None
                }
            },
            RouteDecision::Stay | RouteDecision::AlreadyHandled => None,
        }
    }

    /// 决策并执行
    pub fn route(&self, channel: DeliveryChannel, ingested: &Ingested) -> RouteOutcome {
        let decision = self.decide(channel, ingested);
        let navigated = self.apply(&decision);
        RouteOutcome {
            decision,
            navigated,
        }
    }

    /// 处理冷启动深链（与初始通知检查共享一次性标记）
    pub fn handle_launch_link(&self, url: &str) -> RouteOutcome {
        let decision = match self.links.resolve(url) {
            Some(route @ Route::MessageDetail { .. }) => {
                if self.launch_guard.try_claim() {
                    RouteDecision::Navigate(route)
                } else {
                    RouteDecision::AlreadyHandled
                }
            }
            Some(route) => RouteDecision::Navigate(route),
            None => {
                debug!(url = %url, "Unrecognized deep link");
                RouteDecision::Stay
            }
        };
        let navigated = self.apply(&decision);
        RouteOutcome {
            decision,
            navigated,
        }
    }

    /// 处理运行中收到的深链
    pub fn handle_link(&self, url: &str) -> Option<Route> {
        let route = self.links.resolve(url)?;
        self.go(&route);
        Some(route)
    }

    fn go(&self, route: &Route) {
        info!(screen = route.screen_name(), params = ?route.params(), "Navigating");
        self.navigator.navigate(route.screen_name(), &route.params());
    }
}
