//! 基础设施层：任务存储与结果缓存
//!
//! 只暴露按键读写的能力，不关心阶段流转

pub mod job_store;
pub mod result_cache;

pub use job_store::{mutate_with, JobStore, MemoryJobStore};
pub use result_cache::{
    cache_key, normalize_query, CacheBackend, FileCacheBackend, MemoryCacheBackend, ResultCache,
};
