//! 结果缓存 - 基础设施层
//!
//! 以 (规范化查询, 搜索模式) 的哈希为键保存已完成的任务快照。
//! 只负责键的推导与"只收完整记录"的写入约束，存储介质由 `CacheBackend` 决定。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::models::{JobRecord, SearchMode};

/// 缓存存储介质
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// 读取缓存内容，不存在时返回 `None`
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// 写入缓存内容；键已存在时不覆盖，返回 `false`
    async fn store(&self, key: &str, blob: &[u8]) -> Result<bool, CacheError>;
}

/// 规范化查询：去掉首尾空白、合并连续空白、转小写
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// 缓存键：SHA-256(规范化查询 + 分隔符 + 模式) 的十六进制串
pub fn cache_key(query: &str, mode: SearchMode) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_query(query).as_bytes());
    hasher.update([0x1f]);
    hasher.update(mode.as_str().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 结果缓存
#[derive(Clone)]
pub struct ResultCache {
    backend: Arc<dyn CacheBackend>,
}

impl ResultCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// 内存缓存（测试或不需要持久化时使用）
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCacheBackend::default()))
    }

    /// 写入已完成的任务，返回缓存键
    ///
    /// 未全部完成的记录会被拒绝；已有的缓存条目不会被覆盖
    pub async fn put(&self, record: &JobRecord) -> Result<String, CacheError> {
        if !record.is_complete() {
            return Err(CacheError::IncompleteRecord {
                job_id: record.job_id.clone(),
            });
        }

        let key = cache_key(&record.query, record.mode);
        let mut snapshot = record.clone();
        snapshot.cache_key = Some(key.clone());
        let blob = serde_json::to_vec(&snapshot)?;

        if self.backend.store(&key, &blob).await? {
            info!("💾 结果已缓存: 查询 \"{}\" ({})", record.query, record.mode);
        } else {
            debug!("缓存条目已存在，保持不变: {}", key);
        }
        Ok(key)
    }

    /// 读取缓存，只会返回可以直接展示的完整记录
    pub async fn get(&self, query: &str, mode: SearchMode) -> Option<JobRecord> {
        let key = cache_key(query, mode);
        let blob = match self.backend.load(&key).await {
            Ok(Some(blob)) => blob,
            Ok(None) => return None,
            Err(e) => {
                warn!("读取缓存失败，按未命中处理: {}", e);
                return None;
            }
        };

        match serde_json::from_slice::<JobRecord>(&blob) {
            Ok(record) if record.is_complete() && record.mode == mode => Some(record),
            Ok(record) => {
                warn!("缓存记录 {} 不完整，按未命中处理", record.job_id);
                None
            }
            Err(e) => {
                warn!("缓存记录 {} 无法解析，按未命中处理: {}", key, e);
                None
            }
        }
    }
}

/// 文件缓存：每个键一个 JSON 文件
pub struct FileCacheBackend {
    dir: PathBuf,
}

impl FileCacheBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> CacheError {
    CacheError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl CacheBackend for FileCacheBackend {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn store(&self, key: &str, blob: &[u8]) -> Result<bool, CacheError> {
        let path = self.path_for(key);
        if tokio::fs::try_exists(&path)
            .await
            .map_err(|e| io_error(&path, e))?
        {
            return Ok(false);
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;

        // 先写临时文件再硬链接到正式路径：读者看不到写了一半的内容，
        // 并发写入同一个键时只有一个能成功发布
        let tmp_path = self
            .dir
            .join(format!("{}.{}.tmp", key, uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp_path, blob)
            .await
            .map_err(|e| io_error(&tmp_path, e))?;

        let published = tokio::fs::hard_link(&tmp_path, &path).await;
        if let Err(e) = tokio::fs::remove_file(&tmp_path).await {
            debug!("删除临时文件失败 ({}): {}", tmp_path.display(), e);
        }
        match published {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

/// 内存缓存
#[derive(Default)]
pub struct MemoryCacheBackend {
    entries: DashMap<String, Vec<u8>>,
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    async fn store(&self, key: &str, blob: &[u8]) -> Result<bool, CacheError> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(entry) => {
                entry.insert(blob.to_vec());
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Stage, StageStatus, SummaryResult};

    fn completed_record(query: &str, mode: SearchMode) -> JobRecord {
        let mut record = JobRecord::new(query, mode);
        for &stage in mode.stages() {
            record.progress.advance(stage, StageStatus::Complete);
        }
        record.results.summary = Some(SummaryResult::default());
        record
    }

    #[test]
    fn test_cache_key_is_stable_and_mode_sensitive() {
        assert_eq!(cache_key("p53", SearchMode::Text), cache_key("p53", SearchMode::Text));
        assert_eq!(
            cache_key("  P53   apoptosis ", SearchMode::Text),
            cache_key("p53 apoptosis", SearchMode::Text)
        );
        assert_ne!(cache_key("p53", SearchMode::Text), cache_key("p53", SearchMode::Semantic));
        assert_eq!(cache_key("p53", SearchMode::Text).len(), 64);
    }

    #[tokio::test]
    async fn test_put_then_get_returns_identical_record() {
        let cache = ResultCache::in_memory();
        let record = completed_record("p53", SearchMode::Text);

        let key = cache.put(&record).await.unwrap();
        let cached = cache.get("p53", SearchMode::Text).await.unwrap();

        assert_eq!(cached.cache_key.as_deref(), Some(key.as_str()));
        assert_eq!(JobRecord { cache_key: None, ..cached }, record);
    }

    #[tokio::test]
    async fn test_other_mode_is_a_miss() {
        let cache = ResultCache::in_memory();
        cache.put(&completed_record("p53", SearchMode::Text)).await.unwrap();
        assert!(cache.get("p53", SearchMode::Semantic).await.is_none());
    }

    #[tokio::test]
    async fn test_incomplete_record_is_rejected() {
        let cache = ResultCache::in_memory();
        let mut record = JobRecord::new("p53", SearchMode::Text);
        record.progress.advance(Stage::PrimarySearch, StageStatus::Complete);

        let err = cache.put(&record).await.unwrap_err();
        assert!(matches!(err, CacheError::IncompleteRecord { .. }));
        assert!(cache.get("p53", SearchMode::Text).await.is_none());
    }

    #[tokio::test]
    async fn test_entries_are_not_overwritten() {
        let cache = ResultCache::in_memory();
        let first = completed_record("p53", SearchMode::Text);
        let second = completed_record("P53", SearchMode::Text);

        cache.put(&first).await.unwrap();
        cache.put(&second).await.unwrap();

        let cached = cache.get("p53", SearchMode::Text).await.unwrap();
        assert_eq!(cached.job_id, first.job_id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_file_writers_publish_once() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FileCacheBackend::new(dir.path()));

        for round in 0..20 {
            let key = format!("key-{}", round);
            let handles: Vec<_> = (0..8)
                .map(|writer| {
                    let backend = backend.clone();
                    let key = key.clone();
                    tokio::spawn(async move {
                        let blob = format!("writer-{}", writer).into_bytes();
                        let stored = backend.store(&key, &blob).await.unwrap();
                        (stored, blob)
                    })
                })
                .collect();

            let mut winners = Vec::new();
            for handle in handles {
                let (stored, blob) = handle.await.unwrap();
                if stored {
                    winners.push(blob);
                }
            }

            assert_eq!(winners.len(), 1, "第 {} 轮有多个写入者成功", round);
            let on_disk = backend.load(&key).await.unwrap().unwrap();
            assert_eq!(on_disk, winners[0]);
        }

        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_file_backend_roundtrip_and_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(Arc::new(FileCacheBackend::new(dir.path().join("cache"))));
        let record = completed_record("brca1", SearchMode::Semantic);

        let key = cache.put(&record).await.unwrap();
        let cached = cache.get("brca1", SearchMode::Semantic).await.unwrap();
        assert_eq!(cached.job_id, record.job_id);

        let path = dir.path().join("cache").join(format!("{}.json", key));
        std::fs::write(&path, b"{not json").unwrap();
        assert!(cache.get("brca1", SearchMode::Semantic).await.is_none());
    }
}
