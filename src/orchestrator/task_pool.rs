//! 后台任务池
//!
//! - 并发上限（Semaphore）
//! - 按 `(job_id, stage)` 去重，同一个键同时只会有一个任务
//! - 每个任务带阶段超时
//! - 结果通过 `CompletionHandler` 回调交回编排层

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashSet;
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::models::{SearchHandle, Stage, SummaryResult};

/// 阶段任务的产出
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    /// 语义检索得到的文献 ID
    SemanticIds(Vec<String>),
    /// 外部检索已提交，得到任务句柄
    SearchSubmitted(SearchHandle),
    /// 摘要结果
    Summary(SummaryResult),
}

/// 一次阶段任务的完成通知
#[derive(Debug)]
pub struct StageCompletion {
    pub job_id: String,
    pub stage: Stage,
    pub outcome: GatewayResult<StageOutput>,
}

/// 阶段任务完成回调
#[async_trait]
pub trait CompletionHandler: Send + Sync {
    async fn on_complete(&self, completion: StageCompletion);
}

/// 派发结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// 已进入任务池
    Spawned,
    /// 同一个键的任务仍在执行
    AlreadyInFlight,
    /// 任务池已关闭
    Closed,
}

/// 后台任务池
pub struct TaskPool {
    semaphore: Arc<Semaphore>,
    tracker: TaskTracker,
    in_flight: Arc<DashSet<(String, Stage)>>,
    stage_timeout: Duration,
}

impl TaskPool {
    pub fn new(max_tasks: usize, stage_timeout: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_tasks.max(1))),
            tracker: TaskTracker::new(),
            in_flight: Arc::new(DashSet::new()),
            stage_timeout,
        }
    }

    /// 派发一个阶段任务
    pub fn dispatch<F>(
        &self,
        job_id: &str,
        stage: Stage,
        work: F,
        handler: Arc<dyn CompletionHandler>,
    ) -> Dispatch
    where
        F: Future<Output = GatewayResult<StageOutput>> + Send + 'static,
    {
        if self.tracker.is_closed() {
            warn!("[任务 {}] 任务池已关闭，拒绝派发 {:?}", job_id, stage);
            return Dispatch::Closed;
        }

        let key = (job_id.to_string(), stage);
        if !self.in_flight.insert(key.clone()) {
            debug!("[任务 {}] {:?} 已在执行中，忽略重复派发", job_id, stage);
            return Dispatch::AlreadyInFlight;
        }

        let semaphore = self.semaphore.clone();
        let in_flight = self.in_flight.clone();
        let stage_timeout = self.stage_timeout;
        let job_id = job_id.to_string();

        self.tracker.spawn(async move {
            let outcome = match semaphore.acquire_owned().await {
                Ok(_permit) => run_guarded(stage, stage_timeout, work).await,
                Err(e) => Err(GatewayError::unavailable("task-pool", e)),
            };

            handler
                .on_complete(StageCompletion {
                    job_id,
                    stage,
                    outcome,
                })
                .await;
            in_flight.remove(&key);
        });

        Dispatch::Spawned
    }

    /// 正在执行（或排队）的任务数
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, job_id: &str, stage: Stage) -> bool {
        self.in_flight.contains(&(job_id.to_string(), stage))
    }

    /// 停止接收新任务并等待已派发的任务结束
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

/// 带超时执行，并把 panic 转换成错误
async fn run_guarded<F>(stage: Stage, stage_timeout: Duration, work: F) -> GatewayResult<StageOutput>
where
    F: Future<Output = GatewayResult<StageOutput>> + Send + 'static,
{
    let endpoint = format!("stage:{:?}", stage);
    match AssertUnwindSafe(tokio::time::timeout(stage_timeout, work))
        .catch_unwind()
        .await
    {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(_)) => Err(GatewayError::unavailable(
            endpoint,
            format!("阶段超时 ({}s)", stage_timeout.as_secs()),
        )),
        Err(_) => Err(GatewayError::unavailable(endpoint, "后台任务异常退出")),
    }
}
