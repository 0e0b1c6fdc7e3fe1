//! 流水线编排器 - 编排层
//!
//! ## 职责
//!
//! 1. **提交任务**：创建任务记录，或直接复用结果缓存
//! 2. **推进阶段**：每次轮询时检查当前阶段，必要时派发后台任务
//! 3. **接收结果**：后台任务完成后写回任务记录，摘要完成后写入缓存
//! 4. **淘汰过期任务**：提交和轮询前清理超过保留时长的任务
//!
//! ## 阶段推进规则
//!
//! - 任一阶段 `error` → `failed`
//! - 当前阶段 `not_started` → 在存储内原子地"认领"（前一阶段标记完成，当前阶段标记 `pending`），
//!   只有认领成功的调用者才会派发后台任务
//! - `PrimarySearch` 处于 `pending` 且已拿到外部任务句柄 → 查询一次外部状态，
//!   成功则立即完成并在同一次调用中派发 `Summarize`
//! - 全部完成 → `success`

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::clients::{SearchClient, SemanticClient, SummarizeClient};
use crate::config::{Config, SummarizerBackend};
use crate::error::{AppError, AppResult, GatewayError, GatewayResult};
use crate::infrastructure::{mutate_with, JobStore, ResultCache};
use crate::models::{JobRecord, SearchHandle, SearchMode, Stage, StageProgress, StageStatus};
use crate::orchestrator::task_pool::{
    CompletionHandler, Dispatch, StageCompletion, StageOutput, TaskPool,
};
use crate::services::gateway::{SearchGateway, SearchState, SemanticGateway, SummarizationGateway};
use crate::services::LlmService;
use crate::utils::logging::truncate_text;
use crate::workflow::{JobCtx, SummarizeFlow};

/// 轮询结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PollStatus {
    /// 未知任务或已被淘汰
    NotFound,
    Pending { progress: StageProgress },
    Failed,
    Success { progress: StageProgress },
}

impl PollStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollStatus::Pending { .. })
    }
}

/// 提交结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitOutcome {
    pub job_id: String,
    /// 是否直接命中结果缓存
    pub cached: bool,
}

/// 外部服务集合
#[derive(Clone)]
pub struct Gateways {
    pub search: Arc<dyn SearchGateway>,
    pub semantic: Arc<dyn SemanticGateway>,
    pub summarizer: Arc<dyn SummarizationGateway>,
}

impl Gateways {
    /// 按配置创建 HTTP / LLM 实现
    pub fn from_config(config: &Config) -> GatewayResult<Self> {
        let summarizer: Arc<dyn SummarizationGateway> = match config.summarizer_backend {
            SummarizerBackend::Http => Arc::new(SummarizeClient::new(config)?),
            SummarizerBackend::Llm => Arc::new(LlmService::new(config)),
        };
        Ok(Self {
            search: Arc::new(SearchClient::new(config)?),
            semantic: Arc::new(SemanticClient::new(config)?),
            summarizer,
        })
    }
}

/// 流水线编排器
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    store: Arc<dyn JobStore>,
    cache: ResultCache,
    gateways: Gateways,
    summarize_flow: SummarizeFlow,
    pool: TaskPool,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        store: Arc<dyn JobStore>,
        cache: ResultCache,
        gateways: Gateways,
    ) -> Self {
        let summarize_flow = SummarizeFlow::new(
            &config,
            gateways.search.clone(),
            gateways.summarizer.clone(),
        );
        let pool = TaskPool::new(config.max_background_tasks, config.stage_timeout());
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                cache,
                gateways,
                summarize_flow,
                pool,
            }),
        }
    }

    /// 提交查询，返回任务 ID
    ///
    /// 缓存命中时新任务直接处于完成状态
    pub async fn submit(&self, query: &str, mode: SearchMode) -> AppResult<SubmitOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::EmptyQuery);
        }
        self.inner.evict_expired();

        if let Some(cached) = self.inner.cache.get(query, mode).await {
            let mut record = JobRecord::new(query, mode);
            record.progress = cached.progress;
            record.search_handle = cached.search_handle;
            record.results = cached.results;
            record.cache_key = cached.cache_key;

            let job_id = record.job_id.clone();
            self.inner.store.create(record)?;
            info!(
                "[任务 {}] 💾 命中缓存: \"{}\" ({})",
                job_id,
                truncate_text(query, 60),
                mode
            );
            return Ok(SubmitOutcome {
                job_id,
                cached: true,
            });
        }

        let record = JobRecord::new(query, mode);
        let job_id = record.job_id.clone();
        self.inner.store.create(record)?;
        info!(
            "[任务 {}] 🚀 新任务: \"{}\" ({})",
            job_id,
            truncate_text(query, 60),
            mode
        );
        Ok(SubmitOutcome {
            job_id,
            cached: false,
        })
    }

    /// 轮询并推进任务
    pub async fn advance(&self, job_id: &str) -> PollStatus {
        self.inner.evict_expired();
        let ctx = JobCtx::new(job_id);

        loop {
            let Some(record) = self.inner.store.get(job_id) else {
                return PollStatus::NotFound;
            };
            if record.progress.has_error() {
                return PollStatus::Failed;
            }
            if record.progress.is_complete() {
                return PollStatus::Success {
                    progress: record.progress,
                };
            }
            let Some(current) = record.progress.current() else {
                return PollStatus::Pending {
                    progress: record.progress,
                };
            };

            match current.status {
                StageStatus::NotStarted => {
                    if self.inner.claim(job_id, current.stage) {
                        self.dispatch(&ctx, &record, current.stage);
                    }
                    return self.inner.pending_snapshot(job_id);
                }
                StageStatus::Pending if current.stage == Stage::PrimarySearch => {
                    let Some(handle) = record.search_handle.as_ref() else {
                        return PollStatus::Pending {
                            progress: record.progress,
                        };
                    };
                    match self.inner.poll_search(&ctx, handle).await {
                        SearchState::Success => {
                            if self.inner.mark(job_id, Stage::PrimarySearch, StageStatus::Complete) {
                                info!("{} ✓ 外部分析完成", ctx);
                            }
                            // 继续循环，同一次调用中派发 Summarize
                        }
                        SearchState::Failed => {
                            self.inner.mark(job_id, Stage::PrimarySearch, StageStatus::Error);
                            return PollStatus::Failed;
                        }
                        SearchState::Pending => {
                            return PollStatus::Pending {
                                progress: record.progress,
                            };
                        }
                    }
                }
                _ => {
                    return PollStatus::Pending {
                        progress: record.progress,
                    };
                }
            }
        }
    }

    /// 读取任务快照
    pub fn snapshot(&self, job_id: &str) -> AppResult<JobRecord> {
        self.inner.evict_expired();
        self.inner
            .store
            .get(job_id)
            .ok_or_else(|| AppError::job_not_found(job_id))
    }

    /// 正在执行的后台任务数
    pub fn in_flight(&self) -> usize {
        self.inner.pool.in_flight()
    }

    /// 停止派发并等待后台任务结束
    pub async fn shutdown(&self) {
        info!("⏳ 等待后台任务结束 ({} 个)", self.inner.pool.in_flight());
        self.inner.pool.shutdown().await;
    }

    /// 派发阶段任务（调用方已完成认领）
    fn dispatch(&self, ctx: &JobCtx, record: &JobRecord, stage: Stage) {
        let ctx = ctx.with_stage(stage);
        info!("{} ▶ {}", ctx, stage.label());

        let outcome = match stage {
            Stage::SemanticSearch => self.spawn(record, stage, semantic_search_work(&self.inner, record)),
            Stage::PrimarySearch => self.spawn(record, stage, primary_search_work(&self.inner, record)),
            Stage::Summarize => self.spawn(record, stage, summarize_work(&self.inner, &ctx, record)),
            Stage::Start => return,
        };

        if outcome == Dispatch::Closed {
            warn!("{} 任务池已关闭，阶段标记为失败", ctx);
            self.inner.mark(&record.job_id, stage, StageStatus::Error);
        }
    }

    fn spawn<F>(&self, record: &JobRecord, stage: Stage, work: F) -> Dispatch
    where
        F: Future<Output = GatewayResult<StageOutput>> + Send + 'static,
    {
        let handler: Arc<dyn CompletionHandler> = self.inner.clone();
        self.inner
            .pool
            .dispatch(&record.job_id, stage, work, handler)
    }
}

// ========== 阶段任务 ==========

fn semantic_search_work(
    inner: &Inner,
    record: &JobRecord,
) -> impl Future<Output = GatewayResult<StageOutput>> + Send + 'static {
    let semantic = inner.gateways.semantic.clone();
    let query = record.query.clone();
    async move {
        let ids = semantic.search(&query).await?;
        if ids.is_empty() {
            return Err(GatewayError::rejected(
                "semantic_search",
                None,
                Some("语义检索没有返回任何文献".to_string()),
            ));
        }
        Ok(StageOutput::SemanticIds(ids))
    }
}

fn primary_search_work(
    inner: &Inner,
    record: &JobRecord,
) -> impl Future<Output = GatewayResult<StageOutput>> + Send + 'static {
    let search = inner.gateways.search.clone();
    let query = record.query.clone();
    let semantic_ids = match record.mode {
        SearchMode::Semantic => Some(record.results.semantic_ids.clone().unwrap_or_default()),
        SearchMode::Text => None,
    };
    async move {
        let handle = search.submit(&query).await?;
        if let Some(ids) = semantic_ids {
            search.submit_with_ids(&handle, &query, &ids).await?;
        }
        Ok(StageOutput::SearchSubmitted(handle))
    }
}

fn summarize_work(
    inner: &Arc<Inner>,
    ctx: &JobCtx,
    record: &JobRecord,
) -> impl Future<Output = GatewayResult<StageOutput>> + Send + 'static {
    let inner = inner.clone();
    let ctx = ctx.clone();
    let handle = record.search_handle.clone();
    let query = record.query.clone();
    async move {
        let handle = handle
            .ok_or_else(|| GatewayError::malformed("get_result_api", "缺少外部任务句柄"))?;
        inner
            .summarize_flow
            .run(&ctx, &handle, &query)
            .await
            .map(StageOutput::Summary)
    }
}

// ========== 存储操作 ==========

impl Inner {
    fn evict_expired(&self) {
        let evicted = self.store.evict_older_than(self.config.job_ttl());
        if evicted > 0 {
            info!("🧹 淘汰 {} 个过期任务", evicted);
        }
    }

    /// 原子地认领一个阶段：前一阶段标记完成，当前阶段标记 `pending`
    fn claim(&self, job_id: &str, stage: Stage) -> bool {
        mutate_with(self.store.as_ref(), job_id, |record| {
            let progress = &mut record.progress;
            if progress.has_error() || progress.status(stage) != Some(StageStatus::NotStarted) {
                return false;
            }
            if let Some(previous) = progress.previous(stage) {
                progress.advance(previous, StageStatus::Complete);
            }
            progress.advance(stage, StageStatus::Pending)
        })
        .unwrap_or(false)
    }

    /// 推进阶段状态，返回是否发生变化
    fn mark(&self, job_id: &str, stage: Stage, status: StageStatus) -> bool {
        mutate_with(self.store.as_ref(), job_id, |record| {
            record.progress.advance(stage, status)
        })
        .unwrap_or(false)
    }

    fn pending_snapshot(&self, job_id: &str) -> PollStatus {
        match self.store.get(job_id) {
            Some(record) if record.progress.has_error() => PollStatus::Failed,
            Some(record) => PollStatus::Pending {
                progress: record.progress,
            },
            None => PollStatus::NotFound,
        }
    }

    /// 查询一次外部检索状态，出错或超时视为失败
    async fn poll_search(&self, ctx: &JobCtx, handle: &SearchHandle) -> SearchState {
        let timeout = self.config.gateway_timeout();
        match tokio::time::timeout(timeout, self.gateways.search.poll(handle)).await {
            Ok(Ok(state)) => {
                debug!("{} 外部任务 {} 状态: {:?}", ctx, handle, state);
                state
            }
            Ok(Err(e)) => {
                error!("{} ❌ 查询外部任务状态失败 [{}]: {}", ctx, e.kind(), e);
                SearchState::Failed
            }
            Err(_) => {
                error!("{} ❌ 查询外部任务状态超时 ({}s)", ctx, timeout.as_secs());
                SearchState::Failed
            }
        }
    }

    /// 持久化已完成的任务
    async fn persist(&self, ctx: &JobCtx, job_id: &str) {
        let Some(record) = self.store.get(job_id) else {
            return;
        };
        match self.cache.put(&record).await {
            Ok(key) => {
                if mutate_with(self.store.as_ref(), job_id, |record| {
                    record.cache_key = Some(key);
                })
                .is_err()
                {
                    debug!("{} 任务已被淘汰，不再记录缓存键", ctx);
                }
            }
            Err(e) => warn!("{} ⚠️ 写入缓存失败: {}", ctx, e),
        }
    }
}

/// 把阶段产出写回记录，只接受仍处于 `pending` 的阶段
fn apply_output(record: &mut JobRecord, stage: Stage, output: StageOutput) -> bool {
    if record.progress.status(stage) != Some(StageStatus::Pending) {
        return false;
    }
    match output {
        StageOutput::SemanticIds(ids) => {
            record.results.semantic_ids = Some(ids);
            record.progress.advance(stage, StageStatus::Complete)
        }
        StageOutput::SearchSubmitted(handle) => {
            // 阶段保持 pending，等待轮询确认外部任务完成
            record.search_handle = Some(handle);
            true
        }
        StageOutput::Summary(summary) => {
            record.results.summary = Some(summary);
            record.progress.advance(stage, StageStatus::Complete)
        }
    }
}

#[async_trait]
impl CompletionHandler for Inner {
    async fn on_complete(&self, completion: StageCompletion) {
        let StageCompletion {
            job_id,
            stage,
            outcome,
        } = completion;
        let ctx = JobCtx::new(&job_id).with_stage(stage);

        match outcome {
            Ok(output) => {
                match mutate_with(self.store.as_ref(), &job_id, |record| {
                    apply_output(record, stage, output)
                }) {
                    Ok(true) => info!("{} ✓ {} 完成", ctx, stage.label()),
                    Ok(false) => {
                        warn!("{} ⚠️ 阶段已不在 pending 状态，丢弃结果", ctx);
                        return;
                    }
                    Err(_) => {
                        debug!("{} 任务已被淘汰，丢弃结果", ctx);
                        return;
                    }
                }
                if stage == Stage::Summarize {
                    self.persist(&ctx, &job_id).await;
                }
            }
            Err(e) => {
                error!("{} ❌ {} 失败 [{}]: {}", ctx, stage.label(), e.kind(), e);
                if mutate_with(self.store.as_ref(), &job_id, |record| {
                    record.progress.advance(stage, StageStatus::Error)
                })
                .is_err()
                {
                    debug!("{} 任务已被淘汰，丢弃错误", ctx);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::MemoryJobStore;
    use crate::models::SummaryResult;

    /// 读取正常，但任何修改都像记录已被淘汰一样失败
    #[derive(Default)]
    struct VanishingStore {
        inner: MemoryJobStore,
    }

    impl JobStore for VanishingStore {
        fn create(&self, record: JobRecord) -> AppResult<()> {
            self.inner.create(record)
        }

        fn get(&self, job_id: &str) -> Option<JobRecord> {
            self.inner.get(job_id)
        }

        fn mutate(&self, job_id: &str, _f: &mut dyn FnMut(&mut JobRecord)) -> AppResult<()> {
            Err(AppError::job_not_found(job_id))
        }

        fn list_ids(&self) -> Vec<String> {
            self.inner.list_ids()
        }

        fn evict_older_than(&self, age: std::time::Duration) -> usize {
            self.inner.evict_older_than(age)
        }
    }

    #[test]
    fn test_poll_status_wire_format() {
        let progress = StageProgress::for_mode(SearchMode::Text);
        let json = serde_json::to_value(PollStatus::Pending { progress }).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["progress"][0]["stage"], "start");

        let json = serde_json::to_value(PollStatus::NotFound).unwrap();
        assert_eq!(json, serde_json::json!({"status": "not_found"}));
    }

    #[test]
    fn test_apply_output_requires_pending() {
        let mut record = JobRecord::with_id("job-1", "p53", SearchMode::Text);
        assert!(!apply_output(
            &mut record,
            Stage::Summarize,
            StageOutput::Summary(SummaryResult::default())
        ));
        assert!(record.results.summary.is_none());

        record.progress.advance(Stage::Summarize, StageStatus::Pending);
        assert!(apply_output(
            &mut record,
            Stage::Summarize,
            StageOutput::Summary(SummaryResult::default())
        ));
        assert_eq!(record.progress.status(Stage::Summarize), Some(StageStatus::Complete));
    }

    #[test]
    fn test_search_handle_keeps_stage_pending() {
        let mut record = JobRecord::with_id("job-1", "p53", SearchMode::Text);
        record.progress.advance(Stage::PrimarySearch, StageStatus::Pending);

        assert!(apply_output(
            &mut record,
            Stage::PrimarySearch,
            StageOutput::SearchSubmitted(SearchHandle("ext-1".into()))
        ));
        assert_eq!(record.search_handle, Some(SearchHandle("ext-1".into())));
        assert_eq!(record.progress.status(Stage::PrimarySearch), Some(StageStatus::Pending));
    }

    #[tokio::test]
    async fn test_persist_tolerates_job_evicted_before_key_is_recorded() {
        let config = Config::default();
        let gateways = Gateways::from_config(&config).unwrap();
        let store = Arc::new(VanishingStore::default());
        let cache = ResultCache::in_memory();
        let orchestrator = Orchestrator::new(config, store.clone(), cache.clone(), gateways);

        let mut record = JobRecord::with_id("job-1", "p53", SearchMode::Text);
        for &stage in SearchMode::Text.stages() {
            record.progress.advance(stage, StageStatus::Complete);
        }
        record.results.summary = Some(SummaryResult::default());
        store.create(record).unwrap();

        orchestrator
            .inner
            .persist(&JobCtx::new("job-1"), "job-1")
            .await;

        assert!(cache.get("p53", SearchMode::Text).await.is_some());
        assert_eq!(store.get("job-1").unwrap().cache_key, None);
    }
}
