// src/cli/deliver.rs
//! Deliver 命令 - 模拟一次推送投递，走完整的入库与路由流程
//!
//! - foreground：挂载监听器后前台投递，弹框选择 View/OK
//! - background：交给进程级后台处理器，只入库
//! - opened：挂载后模拟从后台点击通知
//! - launch：设置冷启动通知后挂载（可选先到的深链 `--link`）

use anyhow::{anyhow, Context, Result};
use clap::Args;
use dialoguer::Select;
use std::fs;
use std::io::Read;
use std::sync::Arc;
use tracing::warn;

use crate::config::Config;
use crate::notification::{
    DeliveryChannel, ForegroundPrompt, PromptChoice, PromptPresenter, RawMessage, SetupOutcome,
    StoreOutcome,
};

use super::context::AppContext;
use super::output::describe_store_outcome;

/// Deliver 命令参数
#[derive(Args)]
pub struct DeliverArgs {
    /// 投递渠道: foreground, background, opened, launch
    #[arg(long, short, default_value = "foreground")]
    pub channel: DeliveryChannel,

    /// 前台弹框自动选择 View
    #[arg(long, short)]
    pub yes: bool,

    /// 冷启动时先到达的深链（仅 launch）
    #[arg(long)]
    pub link: Option<String>,

    /// 消息 JSON 文件，`-` 表示 stdin
    pub file: String,
}

/// 终端弹框
pub struct TerminalPrompt {
    auto_view: bool,
}

impl TerminalPrompt {
    pub fn new(auto_view: bool) -> Self {
        Self { auto_view }
    }
}

impl PromptPresenter for TerminalPrompt {
    fn present(&self, prompt: &ForegroundPrompt) -> PromptChoice {
        if self.auto_view {
            return PromptChoice::View;
        }

        let items = prompt.actions();
        let header = if prompt.body.is_empty() {
            prompt.title.clone()
        } else {
            format!("{}\n  {}", prompt.title, prompt.body)
        };
        // OK 是默认/取消按钮
        match Select::new()
            .with_prompt(header)
            .items(&items)
            .default(1)
            .interact_opt()
        {
            Ok(Some(0)) => PromptChoice::View,
            Ok(_) => PromptChoice::Dismiss,
            Err(e) => {
                warn!(error = %e, "Prompt unavailable, dismissing");
                PromptChoice::Dismiss
            }
        }
    }
}

/// 读取消息 JSON（文件或 stdin）
pub fn read_message(source: &str) -> Result<RawMessage> {
    let content = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("读取 stdin 失败")?;
        buf
    } else {
        fs::read_to_string(source).with_context(|| format!("读取消息文件失败: {}", source))?
    };
    serde_json::from_str(&content).context("消息 JSON 格式错误")
}

/// 处理 deliver 命令
pub fn handle_deliver(args: DeliverArgs, config: Config) -> Result<()> {
    let raw = read_message(&args.file)?;
    if args.link.is_some() && args.channel != DeliveryChannel::Launch {
        return Err(anyhow!("--link 只能与 --channel launch 一起使用"));
    }

    let mut ctx = AppContext::bootstrap(config, Arc::new(TerminalPrompt::new(args.yes)))?;
    let result = deliver(&mut ctx, args.channel, args.link.as_deref(), raw);
    ctx.shutdown();
    result
}

/// 按渠道投递一条消息
pub fn deliver(
    ctx: &mut AppContext,
    channel: DeliveryChannel,
    link: Option<&str>,
    raw: RawMessage,
) -> Result<()> {
    match channel {
        DeliveryChannel::Background => {
            let outcome = store_background(ctx, raw)?;
            println!("{}", describe_store_outcome(&outcome));
        }
        DeliveryChannel::Launch => {
            ctx.transport.set_initial_notification(raw);
            if let Some(url) = link {
                ctx.coordinator.handle_launch_link(url);
            }
            report_setup(ctx.coordinator.setup())?;
        }
        DeliveryChannel::Foreground => {
            report_setup(ctx.coordinator.setup())?;
            report_listeners(ctx.transport.deliver_foreground(raw))?;
        }
        DeliveryChannel::Opened => {
            report_setup(ctx.coordinator.setup())?;
            report_listeners(ctx.transport.open_from_background(raw))?;
        }
    }
    Ok(())
}

/// 后台投递，返回入库结果；未注册处理器或写入失败时报错
pub fn store_background(ctx: &AppContext, raw: RawMessage) -> Result<StoreOutcome> {
    let outcome = ctx
        .transport
        .deliver_background(raw)
        .ok_or_else(|| anyhow!("后台处理器未注册"))?;
    match outcome {
        StoreOutcome::Failed(reason) => Err(anyhow!("保存通知失败: {}", reason)),
        outcome => Ok(outcome),
    }
}

fn report_setup(outcome: SetupOutcome) -> Result<()> {
    match outcome {
        SetupOutcome::Ready { .. } => Ok(()),
        SetupOutcome::PermissionDenied => Err(anyhow!("通知权限被拒绝")),
        SetupOutcome::Failed(reason) => Err(anyhow!("推送初始化失败: {}", reason)),
    }
}

fn report_listeners(handled: usize) -> Result<()> {
    if handled == 0 {
        return Err(anyhow!("没有已注册的监听器"));
    }
    Ok(())
}
