//! Push Inbox CLI
//!
//! 模拟推送投递、查看通知历史和详情、解析深链

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};
use push_inbox::{
    cli::{
        describe_store_outcome, format_output, handle_deliver, handle_listen, handle_open,
        read_message, DeliverArgs, ListenArgs,
    },
    notification::{render_history, resolve_with_source, SystemClock},
    Config, DetailView,
};

#[derive(Parser)]
#[command(name = "pinbox")]
#[command(about = "Push Inbox - 推送通知历史与路由")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 投递一条推送消息（前台/后台/打开/冷启动）
    Deliver(DeliverArgs),
    /// 跟踪投递队列文件并持续处理
    Listen(ListenArgs),
    /// 列出通知历史（最新在前）
    History {
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 查看指定消息详情
    Show {
        /// 消息 ID
        message_id: String,
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 清空通知历史
    Clear,
    /// 打开深链（例如 app://message/m1）
    Open {
        /// 深链 URL
        url: String,
    },
    /// 解析消息的规范 ID
    Resolve {
        /// 消息 JSON 文件，`-` 表示 stdin
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 通过 RUST_LOG 环境变量控制日志级别，默认为 info
    // 例如: RUST_LOG=debug pinbox listen --spool deliveries.jsonl
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("push_inbox=info,pinbox=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Deliver(args) => {
            handle_deliver(args, config)?;
        }
        Commands::Listen(args) => {
            handle_listen(args, config).await?;
        }
        Commands::History { json } => {
            let store = config.open_store(Arc::new(SystemClock));
            let records = store.list();
            println!("{}", format_output(&records, json, |r| render_history(r)));
        }
        Commands::Show { message_id, json } => {
            let store = config.open_store(Arc::new(SystemClock));
            let view = DetailView::lookup(&store, &message_id);
            println!("{}", format_output(&view, json, |v| v.render()));
        }
        Commands::Clear => {
            let store = config.open_store(Arc::new(SystemClock));
            let outcome = store.clear();
            println!("{}", describe_store_outcome(&outcome));
            if outcome.is_failure() {
                std::process::exit(1);
            }
        }
        Commands::Open { url } => {
            handle_open(&url, &config)?;
        }
        Commands::Resolve { file } => {
            let raw = read_message(&file)?;
            let (id, source) = resolve_with_source(&raw, &SystemClock);
            println!("{} ({:?})", id, source);
        }
    }

    Ok(())
}
