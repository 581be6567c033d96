// src/cli/listen.rs
//! Listen 命令 - 跟踪 JSONL 投递队列文件，逐条交给推送管道
//!
//! 每行格式：`{"channel": "foreground", "message": {...}}`。
//! 文件被截断时从头开始读取。

use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::notification::{DeliveryChannel, RawMessage, SetupOutcome, StoreOutcome};

use super::context::AppContext;
use super::deliver::{store_background, TerminalPrompt};
use super::output::describe_store_outcome;

/// Listen 命令参数
#[derive(Args)]
pub struct ListenArgs {
    /// 投递队列文件（JSONL）
    #[arg(long, short)]
    pub spool: PathBuf,

    /// 轮询间隔（毫秒）
    #[arg(long, short, default_value = "500")]
    pub interval: u64,

    /// 前台弹框自动选择 View
    #[arg(long, short)]
    pub yes: bool,
}

/// 队列中的一条投递
#[derive(Debug, Clone, Deserialize)]
pub struct SpoolEntry {
    pub channel: DeliveryChannel,
    pub message: RawMessage,
}

/// 增量读取队列文件
pub struct SpoolReader {
    path: PathBuf,
    offset: u64,
}

impl SpoolReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取自上次以来新增的完整行
    pub fn poll(&mut self) -> Result<Vec<SpoolEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut file = File::open(&self.path)
            .with_context(|| format!("无法打开队列文件: {}", self.path.display()))?;
        let len = file.metadata()?.len();
        if len < self.offset {
            debug!(path = %self.path.display(), "Spool truncated, rewinding");
            self.offset = 0;
        }
        file.seek(SeekFrom::Start(self.offset))?;

        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader.read_line(&mut line)?;
            // 未写完的行留到下次
            if read == 0 || !line.ends_with('\n') {
                break;
            }
            self.offset += read as u64;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<SpoolEntry>(trimmed) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(error = %e, "Skipping malformed spool line"),
            }
        }
        Ok(entries)
    }
}

/// 处理 listen 命令
pub async fn handle_listen(args: ListenArgs, config: Config) -> Result<()> {
    let mut ctx = AppContext::bootstrap(config, Arc::new(TerminalPrompt::new(args.yes)))?;
    match ctx.coordinator.setup() {
        SetupOutcome::Ready { .. } => {}
        other => {
            warn!(outcome = ?other, "Push setup incomplete, only background deliveries will be stored");
        }
    }

    let mut reader = SpoolReader::new(&args.spool);
    info!(spool = %reader.path().display(), interval_ms = args.interval, "Listening for deliveries");
    println!("🔔 监听投递队列: {} (Ctrl+C 停止)", reader.path().display());

    let mut failures = 0usize;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\n停止监听");
                break;
            }
            _ = sleep(Duration::from_millis(args.interval)) => {
                let entries = match reader.poll() {
                    Ok(entries) => entries,
                    Err(e) => {
                        warn!(error = %e, "Failed to read spool");
                        continue;
                    }
                };
                for entry in entries {
                    if let Err(e) = dispatch(&ctx, entry) {
                        warn!(error = %e, "Delivery failed");
                        failures += 1;
                    }
                }
            }
        }
    }

    ctx.shutdown();
    if failures > 0 {
        return Err(anyhow!("{} 条投递处理失败", failures));
    }
    Ok(())
}

/// 处理一条投递，后台渠道返回入库结果
pub fn dispatch(ctx: &AppContext, entry: SpoolEntry) -> Result<Option<StoreOutcome>> {
    match entry.channel {
        DeliveryChannel::Background => {
            let outcome = store_background(ctx, entry.message)?;
            println!("[background] {}", describe_store_outcome(&outcome));
            return Ok(Some(outcome));
        }
        DeliveryChannel::Foreground => {
            ctx.transport.deliver_foreground(entry.message);
        }
        DeliveryChannel::Opened => {
            ctx.transport.open_from_background(entry.message);
        }
        DeliveryChannel::Launch => {
            // 已在运行，冷启动投递按后台点击处理
            debug!("Launch delivery while running, treating as opened");
            ctx.transport.open_from_background(entry.message);
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{DuplicatePolicy, HandlerRegistry, SystemClock};
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::tempdir;

    fn entry(channel: DeliveryChannel, id: &str, title: &str) -> SpoolEntry {
        SpoolEntry {
            channel,
            message: RawMessage::new()
                .with_data_message_id(id)
                .with_notification(title, ""),
        }
    }

    #[test]
    fn test_dispatch_reports_background_outcome() {
        let dir = tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().join("data"),
            duplicate_policy: DuplicatePolicy::DedupOnWrite,
            ..Config::default()
        };
        let ctx = AppContext::with_registry(
            config.clone(),
            Arc::new(TerminalPrompt::new(true)),
            Arc::new(HandlerRegistry::new()),
        )
        .unwrap();

        let first = dispatch(&ctx, entry(DeliveryChannel::Background, "x", "Old")).unwrap();
        let second = dispatch(&ctx, entry(DeliveryChannel::Background, "x", "New")).unwrap();
        assert!(matches!(first, Some(StoreOutcome::Written(_))));
        assert!(matches!(second, Some(StoreOutcome::Skipped(_))));

        // 打开渠道不入库
        let opened = dispatch(&ctx, entry(DeliveryChannel::Opened, "x", "New")).unwrap();
        assert_eq!(opened, None);

        let records = config.open_store(Arc::new(SystemClock)).list();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Old");
        ctx.shutdown();
    }

    fn append_line(path: &Path, line: &str) {
        let mut file = OpenOptions::new().create(true).append(true).open(path).unwrap();
        file.write_all(line.as_bytes()).unwrap();
    }

    #[test]
    fn test_poll_missing_file() {
        let dir = tempdir().unwrap();
        let mut reader = SpoolReader::new(dir.path().join("spool.jsonl"));
        assert!(reader.poll().unwrap().is_empty());
    }

    #[test]
    fn test_poll_reads_incrementally() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("spool.jsonl");
        let mut reader = SpoolReader::new(&path);

        append_line(&path, "{\"channel\":\"background\",\"message\":{\"data\":{\"messageId\":\"a\"}}}\n");
        let first = reader.poll().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].channel, DeliveryChannel::Background);
        assert_eq!(first[0].message.data_message_id(), Some("a".to_string()));

        append_line(&path, "not json\n{\"channel\":\"opened\",\"message\":{\"messageId\":\"b\"}}\n");
        let second = reader.poll().unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].channel, DeliveryChannel::Opened);
        assert!(reader.poll().unwrap().is_empty());
    }

    #[test]
    fn test_partial_line_waits_for_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("spool.jsonl");
        let mut reader = SpoolReader::new(&path);

        append_line(&path, "{\"channel\":\"foreground\",");
        assert!(reader.poll().unwrap().is_empty());
        append_line(&path, "\"message\":{}}\n");
        assert_eq!(reader.poll().unwrap().len(), 1);
    }

    #[test]
    fn test_truncated_spool_rewinds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("spool.jsonl");
        let mut reader = SpoolReader::new(&path);

        append_line(&path, "{\"channel\":\"background\",\"message\":{}}\n{\"channel\":\"background\",\"message\":{}}\n");
        assert_eq!(reader.poll().unwrap().len(), 2);

        std::fs::write(&path, "{\"channel\":\"opened\",\"message\":{}}\n").unwrap();
        let entries = reader.poll().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].channel, DeliveryChannel::Opened);
    }
}
