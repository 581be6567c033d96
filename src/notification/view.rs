//! 历史列表和详情页的数据与文本渲染

use chrono::{Local, TimeZone};
use serde::Serialize;

use super::store::{HistoryStore, NotificationRecord};

/// 空列表提示
pub const EMPTY_HISTORY_TEXT: &str = "No notifications yet.";

/// 详情页
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DetailView {
    Found { record: NotificationRecord },
    NotFound {
        #[serde(rename = "messageId")]
        message_id: String,
    },
}

impl DetailView {
    /// 按 ID 查找
    pub fn lookup(store: &HistoryStore, message_id: &str) -> Self {
        match store.find(message_id) {
            Some(record) => DetailView::Found { record },
            None => DetailView::NotFound {
                message_id: message_id.to_string(),
            },
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, DetailView::Found { .. })
    }

    pub fn render(&self) -> String {
        match self {
            DetailView::Found { record } => {
                let received = format_datetime(record.timestamp);
                let fields = [
                    ("TITLE", record.title.as_str()),
                    ("BODY", record.body.as_str()),
                    ("RECEIVED AT", received.as_str()),
                    ("MESSAGE ID", record.message_id.as_str()),
                ];
                fields
                    .iter()
                    .map(|(label, value)| format!("{}\n{}", label, value))
                    .collect::<Vec<_>>()
                    .join("\n\n")
            }
            DetailView::NotFound { message_id } => {
                format!("Message not found or ID: {}", message_id)
            }
        }
    }
}

/// 渲染历史列表（最新在前）
pub fn render_history(records: &[NotificationRecord]) -> String {
    if records.is_empty() {
        return EMPTY_HISTORY_TEXT.to_string();
    }

    records
        .iter()
        .map(|record| {
            let mut item = format!("{}  {}", format_time(record.timestamp), record.title);
            for line in preview_lines(&record.body, 2) {
                item.push_str("\n    ");
                item.push_str(&line);
            }
            item
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 取正文前 `max` 行，被截断时末行加省略号
fn preview_lines(body: &str, max: usize) -> Vec<String> {
    let lines: Vec<&str> = body.lines().filter(|l| !l.trim().is_empty()).collect();
    let mut preview: Vec<String> = lines.iter().take(max).map(|l| l.to_string()).collect();
    if lines.len() > max {
        if let Some(last) = preview.last_mut() {
            last.push('…');
        }
    }
    preview
}

fn format_datetime(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => millis.to_string(),
    }
}

fn format_time(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(dt) => dt.format("%H:%M:%S").to_string(),
        None => millis.to_string(),
    }
}
