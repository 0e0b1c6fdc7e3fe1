//! 主题摘要流程
//!
//! 每个主题簇：连通性过滤 → 主题摘要 → （摘要非空时）生成标题

use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::analysis::ConnectivityFilter;
use crate::error::GatewayResult;
use crate::models::{AnalysisPayload, CitationGraph, TopicSummary};
use crate::services::gateway::SummarizationGateway;
use crate::workflow::job_ctx::JobCtx;

/// 为全部主题生成摘要，按主题 ID 升序返回
///
/// 最多同时处理 `concurrency` 个主题；任何一个主题失败则整体失败
pub async fn summarize_topics(
    ctx: &JobCtx,
    summarizer: &dyn SummarizationGateway,
    payload: &AnalysisPayload,
    filter: ConnectivityFilter,
    concurrency: usize,
) -> GatewayResult<Vec<TopicSummary>> {
    let graph = payload.citation_graph();
    let topic_ids = payload.topic_ids();
    info!("{} 📝 开始生成 {} 个主题摘要", ctx, topic_ids.len());

    let results: Vec<GatewayResult<TopicSummary>> = stream::iter(topic_ids)
        .map(|topic| summarize_topic(ctx, summarizer, payload, &graph, filter, topic))
        .buffered(concurrency.max(1))
        .collect()
        .await;

    results.into_iter().collect()
}

async fn summarize_topic(
    ctx: &JobCtx,
    summarizer: &dyn SummarizationGateway,
    payload: &AnalysisPayload,
    graph: &CitationGraph,
    filter: ConnectivityFilter,
    topic: usize,
) -> GatewayResult<TopicSummary> {
    let candidates = payload.documents_in_topic(topic);
    let documents = filter.apply(&candidates, graph);
    debug!(
        "{} 主题 {}: 连通性过滤 {} -> {}",
        ctx,
        topic,
        candidates.len(),
        documents.len()
    );

    let keywords = payload.keywords_for(topic);
    let summary = summarizer.summarize_topic(&documents).await?;
    let title = if summary.trim().is_empty() {
        String::new()
    } else {
        summarizer.title(&summary, &keywords).await?
    };

    Ok(TopicSummary {
        number: topic + 1,
        title,
        summary,
        keywords,
        document_count: documents.len(),
    })
}
