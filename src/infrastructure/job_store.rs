//! 任务存储 - 基础设施层
//!
//! 持有全部任务记录，只暴露按 ID 读写的能力

use std::time::Duration;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::JobRecord;

/// 任务存储接口
///
/// 职责：
/// - 同一任务的读写串行化（同一时刻只有一个写者）
/// - 不同任务之间互不加锁
/// - 淘汰与修改互斥：正在修改的记录不会被淘汰
pub trait JobStore: Send + Sync {
    /// 创建任务，ID 已存在时失败
    fn create(&self, record: JobRecord) -> AppResult<()>;

    /// 读取任务快照
    fn get(&self, job_id: &str) -> Option<JobRecord>;

    /// 原子地修改一条记录
    fn mutate(&self, job_id: &str, f: &mut dyn FnMut(&mut JobRecord)) -> AppResult<()>;

    /// 全部任务 ID
    fn list_ids(&self) -> Vec<String>;

    /// 淘汰创建时间早于 `age` 之前的任务，返回淘汰数量
    fn evict_older_than(&self, age: Duration) -> usize;
}

/// 在记录上执行带返回值的修改
pub fn mutate_with<R>(
    store: &dyn JobStore,
    job_id: &str,
    f: impl FnOnce(&mut JobRecord) -> R,
) -> AppResult<R> {
    let mut f = Some(f);
    let mut output = None;
    store.mutate(job_id, &mut |record: &mut JobRecord| {
        if let Some(f) = f.take() {
            output = Some(f(record));
        }
    })?;
    output.ok_or_else(|| AppError::job_not_found(job_id))
}

/// 内存任务存储
///
/// 基于 `DashMap`：`mutate` 持有记录所在分片的写锁，
/// `evict_older_than` 通过 `retain` 获取同样的写锁，两者不会交错。
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: DashMap<String, JobRecord>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl JobStore for MemoryJobStore {
    fn create(&self, record: JobRecord) -> AppResult<()> {
        match self.jobs.entry(record.job_id.clone()) {
            Entry::Occupied(entry) => Err(AppError::JobAlreadyExists {
                job_id: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                debug!("创建任务: {}", record.job_id);
                entry.insert(record);
                Ok(())
            }
        }
    }

    fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.jobs.get(job_id).map(|r| r.value().clone())
    }

    fn mutate(&self, job_id: &str, f: &mut dyn FnMut(&mut JobRecord)) -> AppResult<()> {
        let mut record = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| AppError::job_not_found(job_id))?;
        f(record.value_mut());
        Ok(())
    }

    fn list_ids(&self) -> Vec<String> {
        self.jobs.iter().map(|entry| entry.key().clone()).collect()
    }

    fn evict_older_than(&self, age: Duration) -> usize {
        let Ok(age) = chrono::Duration::from_std(age) else {
            return 0;
        };
        let cutoff = Utc::now() - age;
        let mut evicted = 0;
        self.jobs.retain(|_, record| {
            let keep = record.created_at >= cutoff;
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SearchMode, Stage, StageStatus};
    use std::sync::Arc;

    #[test]
    fn test_create_rejects_duplicate_id() {
        let store = MemoryJobStore::new();
        store.create(JobRecord::with_id("job-1", "p53", SearchMode::Text)).unwrap();

        let err = store
            .create(JobRecord::with_id("job-1", "brca1", SearchMode::Text))
            .unwrap_err();
        assert!(matches!(err, AppError::JobAlreadyExists { .. }));
        assert_eq!(store.get("job-1").unwrap().query, "p53");
    }

    #[test]
    fn test_mutate_missing_job() {
        let store = MemoryJobStore::new();
        let err = store.mutate("nope", &mut |_| {}).unwrap_err();
        assert!(matches!(err, AppError::JobNotFound { .. }));
    }

    #[test]
    fn test_mutate_with_returns_value() {
        let store = MemoryJobStore::new();
        store.create(JobRecord::with_id("job-1", "p53", SearchMode::Text)).unwrap();

        let changed = mutate_with(&store, "job-1", |record| {
            record.progress.advance(Stage::PrimarySearch, StageStatus::Pending)
        })
        .unwrap();

        assert!(changed);
        assert_eq!(
            store.get("job-1").unwrap().progress.status(Stage::PrimarySearch),
            Some(StageStatus::Pending)
        );
    }

    #[test]
    fn test_evict_older_than_removes_only_old_jobs() {
        let store = MemoryJobStore::new();
        store.create(JobRecord::with_id("old", "q", SearchMode::Text)).unwrap();
        store.create(JobRecord::with_id("fresh", "q", SearchMode::Text)).unwrap();
        store
            .mutate("old", &mut |r| r.created_at = Utc::now() - chrono::Duration::hours(25))
            .unwrap();

        let evicted = store.evict_older_than(Duration::from_secs(24 * 60 * 60));

        assert_eq!(evicted, 1);
        assert!(store.get("old").is_none());
        assert!(store.get("fresh").is_some());
        assert_eq!(store.list_ids(), vec!["fresh".to_string()]);
    }

    #[test]
    fn test_evicted_count_ignores_concurrent_creates() {
        let store = Arc::new(MemoryJobStore::new());
        for i in 0..50 {
            let mut record = JobRecord::with_id(format!("old-{}", i), "q", SearchMode::Text);
            record.created_at = Utc::now() - chrono::Duration::hours(25);
            store.create(record).unwrap();
        }

        let creator = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    store
                        .create(JobRecord::with_id(format!("new-{}", i), "q", SearchMode::Text))
                        .unwrap();
                }
            })
        };
        let evicted = store.evict_older_than(Duration::from_secs(24 * 60 * 60));
        creator.join().unwrap();

        assert_eq!(evicted, 50);
        assert_eq!(store.len(), 500);
    }

    #[test]
    fn test_concurrent_mutations_are_serialized() {
        let store = Arc::new(MemoryJobStore::new());
        store.create(JobRecord::with_id("job-1", "", SearchMode::Text)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store.mutate("job-1", &mut |r| r.query.push('x')).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get("job-1").unwrap().query.len(), 800);
    }
}
