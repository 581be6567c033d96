//! 键值存储后端 - 以字符串 blob 为单位的 get/set/remove
//!
//! `MemoryStore` 用于测试和临时会话，`FileStore` 每个键一个文件，
//! 写入走临时文件 + rename，并用 fs2 文件锁与其他进程（如后台处理器）互斥。

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// 不透明的键值存储
pub trait KeyValueStore: Send + Sync {
    /// 读取键，不存在返回 `None`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// 写入键（整体覆盖）
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// 删除键，不存在时视为成功
    fn remove(&self, key: &str) -> Result<()>;

    /// 读-改-写：`op` 收到当前值，返回 `Some` 时写回，`None` 时不写
    ///
    /// 默认实现不具备原子性，后端应在自身锁内完成整个过程。
    fn update(&self, key: &str, op: &mut dyn FnMut(Option<String>) -> Option<String>) -> Result<()> {
        let current = self.get(key)?;
        if let Some(next) = op(current) {
            self.set(key, &next)?;
        }
        Ok(())
    }
}

/// 内存存储
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注入读取失败（测试用）
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// 注入写入/删除失败（测试用）
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("injected read failure"));
        }
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("injected write failure"));
        }
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("injected write failure"));
        }
        self.lock()?.remove(key);
        Ok(())
    }

    fn update(&self, key: &str, op: &mut dyn FnMut(Option<String>) -> Option<String>) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("injected read failure"));
        }
        let mut entries = self.lock()?;
        if let Some(next) = op(entries.get(key).cloned()) {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(anyhow!("injected write failure"));
            }
            entries.insert(key.to_string(), next);
        }
        Ok(())
    }
}

/// 文件存储 - 每个键对应 `<dir>/<sanitized key>.json`
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 默认存储目录（与配置文件分开）
    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("push-inbox")
            .join("data")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 键对应的文件路径
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }

    /// 以独占锁执行操作
    fn with_lock<T>(&self, key: &str, op: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
        use fs2::FileExt;

        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let lock_path = path.with_extension("lock");
        let lock = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&lock_path)?;

        lock.lock_exclusive()?;
        let result = op(&path);
        lock.unlock()?;
        result
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        self.with_lock(key, |path| match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_lock(key, |path| write_atomic(path, value))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.with_lock(key, |path| match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        })
    }

    fn update(&self, key: &str, op: &mut dyn FnMut(Option<String>) -> Option<String>) -> Result<()> {
        self.with_lock(key, |path| {
            let current = match fs::read_to_string(path) {
                Ok(content) => Some(content),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(e.into()),
            };
            match op(current) {
                Some(next) => write_atomic(path, &next),
                None => Ok(()),
            }
        })
    }
}

/// 写临时文件后 rename，读者不会看到半截内容
fn write_atomic(path: &Path, value: &str) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    {
        let mut temp_file = File::create(&temp_path)?;
        temp_file.write_all(value.as_bytes())?;
        temp_file.sync_all()?;
    }
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// 键名转换为安全的文件名（`@notifications` -> `notifications`）
fn sanitize_key(key: &str) -> String {
    let cleaned: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        "store".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("@notifications"), "notifications");
        assert_eq!(sanitize_key("a/b c"), "a_b_c");
        assert_eq!(sanitize_key("@@"), "store");
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_memory_store_injected_failures() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        assert!(store.set("k", "v").is_err());
        assert!(store.remove("k").is_err());
        store.fail_writes(false);
        store.set("k", "v").unwrap();

        store.fail_reads(true);
        assert!(store.get("k").is_err());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        assert_eq!(store.get("@notifications").unwrap(), None);
        store.set("@notifications", "[]").unwrap();
        assert_eq!(store.get("@notifications").unwrap(), Some("[]".to_string()));
        assert!(store.path_for("@notifications").ends_with("notifications.json"));

        store.remove("@notifications").unwrap();
        assert_eq!(store.get("@notifications").unwrap(), None);
        // 删除不存在的键不报错
        store.remove("@notifications").unwrap();
    }

    #[test]
    fn test_update_skips_write_on_none() {
        let store = MemoryStore::new();
        store.update("k", &mut |current| {
            assert!(current.is_none());
            None
        })
        .unwrap();
        assert_eq!(store.get("k").unwrap(), None);

        store
            .update("k", &mut |current| Some(format!("{}+", current.unwrap_or_default())))
            .unwrap();
        store
            .update("k", &mut |current| Some(format!("{}+", current.unwrap_or_default())))
            .unwrap();
        assert_eq!(store.get("k").unwrap(), Some("++".to_string()));
    }

    #[test]
    fn test_file_store_update_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().to_path_buf();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || {
                    // 每个线程独立实例，模拟不同进程
                    let store = FileStore::new(path);
                    for _ in 0..10 {
                        store
                            .update("counter", &mut |current| {
                                let n: u32 = current.and_then(|c| c.parse().ok()).unwrap_or(0);
                                Some((n + 1).to_string())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let store = FileStore::new(&path);
        assert_eq!(store.get("counter").unwrap(), Some("40".to_string()));
    }

    #[test]
    fn test_file_store_overwrite_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.set("k", "first").unwrap();
        store.set("k", "second").unwrap();

        assert_eq!(store.get("k").unwrap(), Some("second".to_string()));
        assert!(!store.path_for("k").with_extension("tmp").exists());
    }
}
