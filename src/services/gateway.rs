//! 外部服务接口 - 业务能力层
//!
//! 流水线只依赖这里的 trait，具体实现位于 `clients/`（HTTP）
//! 与 `services::llm_service`（直接调用 LLM）。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GatewayResult;
use crate::models::{AnalysisPayload, Category, ConnectedDocument, ExtractedEntity, SearchHandle};

/// 外部搜索任务的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchState {
    Pending,
    Success,
    Failed,
}

/// 外部搜索与深度分析服务
#[async_trait]
pub trait SearchGateway: Send + Sync {
    /// 提交文本检索，返回任务句柄
    async fn submit(&self, query: &str) -> GatewayResult<SearchHandle>;

    /// 把语义检索得到的文献 ID 交给已提交的任务
    async fn submit_with_ids(
        &self,
        handle: &SearchHandle,
        query: &str,
        ids: &[String],
    ) -> GatewayResult<()>;

    /// 查询任务状态
    async fn poll(&self, handle: &SearchHandle) -> GatewayResult<SearchState>;

    /// 拉取分析结果
    async fn fetch_result(&self, handle: &SearchHandle, query: &str)
        -> GatewayResult<AnalysisPayload>;
}

/// 语义检索服务
#[async_trait]
pub trait SemanticGateway: Send + Sync {
    /// 返回按相关度排序的文献 ID
    async fn search(&self, query: &str) -> GatewayResult<Vec<String>>;
}

/// 摘要服务
#[async_trait]
pub trait SummarizationGateway: Send + Sync {
    /// 从文献中提取某类实体
    async fn summarize(
        &self,
        category: Category,
        documents: &[ConnectedDocument],
    ) -> GatewayResult<Vec<ExtractedEntity>>;

    /// 生成主题摘要
    async fn summarize_topic(&self, documents: &[ConnectedDocument]) -> GatewayResult<String>;

    /// 根据摘要和关键词生成主题标题
    async fn title(&self, summary: &str, keywords: &[String]) -> GatewayResult<String>;
}
