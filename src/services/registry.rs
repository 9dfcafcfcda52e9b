//! 一次性邮箱注册表 - 业务能力层
//!
//! 只负责"这个邮箱是否用过"的判断和登记，由会话控制器在开考时调用。

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};

/// 邮箱注册表
pub trait EmailRegistry: Send + Sync {
    /// 邮箱是否已经用过
    fn has(&self, email_key: &str) -> bool;

    /// 登记邮箱
    fn mark_used(&self, email_key: &str) -> AppResult<()>;

    /// 检查并登记，返回是否由本次调用登记成功
    ///
    /// 默认实现依次调用 `has` 和 `mark_used`，实现方可以覆盖为原子操作。
    fn claim(&self, email_key: &str) -> AppResult<bool> {
        if self.has(email_key) {
            return Ok(false);
        }
        self.mark_used(email_key)?;
        Ok(true)
    }
}

/// 内存注册表
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    used: Mutex<HashSet<String>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        // 集合操作不会在持锁时 panic，中毒后直接取回数据
        self.used.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl EmailRegistry for InMemoryRegistry {
    fn has(&self, email_key: &str) -> bool {
        self.lock().contains(email_key)
    }

    fn mark_used(&self, email_key: &str) -> AppResult<()> {
        self.lock().insert(email_key.to_string());
        Ok(())
    }

    fn claim(&self, email_key: &str) -> AppResult<bool> {
        Ok(self.lock().insert(email_key.to_string()))
    }
}

/// JSON 文件注册表
///
/// 文件内容是已用邮箱的字符串数组，每次登记后整体重写。
#[derive(Debug)]
pub struct JsonFileRegistry {
    path: PathBuf,
    used: Mutex<HashSet<String>>,
}

impl JsonFileRegistry {
    /// 打开注册表文件，文件不存在时视为空表
    pub fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        let used: HashSet<String> = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
            if content.trim().is_empty() {
                HashSet::new()
            } else {
                serde_json::from_str::<Vec<String>>(&content)?
                    .into_iter()
                    .collect()
            }
        } else {
            HashSet::new()
        };

        info!("📒 已加载邮箱注册表 {} ({} 条)", path.display(), used.len());

        Ok(Self {
            path,
            used: Mutex::new(used),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, used: &HashSet<String>) -> AppResult<()> {
        let mut entries: Vec<&String> = used.iter().collect();
        entries.sort();
        let content = serde_json::to_string_pretty(&entries)?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, content)
            .map_err(|e| AppError::file_write_failed(tmp_path.display().to_string(), e))?;
        std::fs::rename(&tmp_path, &self.path)
            .map_err(|e| AppError::file_write_failed(self.path.display().to_string(), e))?;
        Ok(())
    }
}

impl EmailRegistry for JsonFileRegistry {
    fn has(&self, email_key: &str) -> bool {
        self.used
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(email_key)
    }

    fn mark_used(&self, email_key: &str) -> AppResult<()> {
        self.claim(email_key).map(|_| ())
    }

    fn claim(&self, email_key: &str) -> AppResult<bool> {
        let mut used = self.used.lock().unwrap_or_else(|e| e.into_inner());
        if used.contains(email_key) {
            return Ok(false);
        }

        used.insert(email_key.to_string());
        if let Err(e) = self.persist(&used) {
            // 写盘失败时回滚，保证内存与文件一致
            used.remove(email_key);
            return Err(e);
        }

        debug!("邮箱已登记: {}", email_key);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_claim_is_once() {
        let registry = InMemoryRegistry::new();
        assert!(!registry.has("a@x.com"));
        assert!(registry.claim("a@x.com").unwrap());
        assert!(!registry.claim("a@x.com").unwrap());
        assert!(registry.has("a@x.com"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_file_registry_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("used_emails.json");

        let registry = JsonFileRegistry::open(&path).unwrap();
        assert!(registry.claim("a@x.com").unwrap());
        assert!(!registry.claim("a@x.com").unwrap());
        drop(registry);

        let reopened = JsonFileRegistry::open(&path).unwrap();
        assert!(reopened.has("a@x.com"));
        assert!(!reopened.has("b@x.com"));
    }

    #[test]
    fn test_file_registry_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("used_emails.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(JsonFileRegistry::open(&path).is_err());
    }
}
