//! 配置 - `~/.config/push-inbox/config.json`
//!
//! 所有字段都有默认值，文件不存在时直接使用默认配置。
//! 环境变量：
//! - `PUSH_INBOX_CONFIG`：配置文件路径
//! - `PUSH_INBOX_DATA_DIR`：覆盖 `data_dir`

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::notification::{
    Clock, DeepLinkResolver, DuplicatePolicy, FileStore, HistoryStore, IngestionPipeline,
    DEFAULT_LINK_PREFIX, DEFAULT_STORAGE_KEY, DEFAULT_TITLE,
};

pub const CONFIG_ENV: &str = "PUSH_INBOX_CONFIG";
pub const DATA_DIR_ENV: &str = "PUSH_INBOX_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 存储目录
    pub data_dir: PathBuf,
    /// 历史集合键
    pub storage_key: String,
    /// 缺失标题时的占位文本
    pub default_title: String,
    /// 深链前缀
    pub link_prefixes: Vec<String>,
    /// 重复 messageId 的处理策略
    pub duplicate_policy: DuplicatePolicy,
    /// 最多保留多少条记录
    pub max_records: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: FileStore::default_dir(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            default_title: DEFAULT_TITLE.to_string(),
            link_prefixes: vec![DEFAULT_LINK_PREFIX.to_string()],
            duplicate_policy: DuplicatePolicy::default(),
            max_records: None,
        }
    }
}

impl Config {
    /// 默认配置文件路径
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("push-inbox")
            .join("config.json")
    }

    /// 按环境变量和默认路径加载
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_path);
        let mut config = Self::load_from(&path)?;
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }
        config.ensure_store_outside(&path)?;
        Ok(config)
    }

    /// 从指定文件加载，不存在时返回默认配置
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        config.validate()?;
        config.ensure_store_outside(path)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage_key.trim().is_empty() {
            return Err(anyhow!("storage_key must not be empty"));
        }
        if self.link_prefixes.is_empty() {
            return Err(anyhow!("link_prefixes must contain at least one prefix"));
        }
        if self.max_records == Some(0) {
            return Err(anyhow!("max_records must be positive"));
        }
        Ok(())
    }

    /// 历史文件不能与配置文件重合
    pub fn ensure_store_outside(&self, config_path: &Path) -> Result<()> {
        let store_path = FileStore::new(&self.data_dir).path_for(&self.storage_key);
        if store_path.as_path() == config_path {
            return Err(anyhow!(
                "storage_key {} would overwrite config file {}",
                self.storage_key,
                config_path.display()
            ));
        }
        Ok(())
    }

    /// 打开磁盘上的历史存储
    pub fn open_store(&self, clock: Arc<dyn Clock>) -> HistoryStore {
        HistoryStore::new(Arc::new(FileStore::new(&self.data_dir)), clock)
            .with_key(&self.storage_key)
            .with_duplicate_policy(self.duplicate_policy)
            .with_max_records(self.max_records)
    }

    /// 构建接入管道
    pub fn pipeline(&self, store: Arc<HistoryStore>) -> IngestionPipeline {
        IngestionPipeline::new(store).with_default_title(&self.default_title)
    }

    /// 构建深链解析器
    pub fn link_resolver(&self) -> Result<DeepLinkResolver> {
        DeepLinkResolver::new(self.link_prefixes.iter().cloned())
    }
}
