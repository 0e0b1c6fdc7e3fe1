//! Summarize 阶段流程 - 流程层
//!
//! 流程顺序：
//! 1. 拉取外部分析结果
//! 2. 类别摘要：按主题做连通性过滤 → 并发提取各类实体（最多 `max_category_workers` 个）→ 计算得分 → 构建共现图
//! 3. 主题摘要：见 `topic_flow`

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{error, info};

use crate::analysis::cooccurrence::document_weight;
use crate::analysis::{build_cooccurrence_graph, ConnectivityFilter, FilterLimit};
use crate::config::Config;
use crate::error::GatewayResult;
use crate::models::{
    AnalysisPayload, Category, CategorySummary, ConnectedDocument, Entity, ExtractedEntity,
    SearchHandle, SummaryResult,
};
use crate::services::gateway::{SearchGateway, SummarizationGateway};
use crate::workflow::job_ctx::JobCtx;
use crate::workflow::topic_flow;

/// Summarize 阶段流程
///
/// - 编排"拉取结果 → 类别摘要 → 主题摘要"
/// - 不持有任务记录，也不关心阶段状态
/// - 只依赖业务能力（services）
pub struct SummarizeFlow {
    search: Arc<dyn SearchGateway>,
    summarizer: Arc<dyn SummarizationGateway>,
    categories: Vec<Category>,
    max_category_workers: usize,
    category_filter: ConnectivityFilter,
    topic_filter: ConnectivityFilter,
}

impl SummarizeFlow {
    /// 创建新的 Summarize 流程
    pub fn new(
        config: &Config,
        search: Arc<dyn SearchGateway>,
        summarizer: Arc<dyn SummarizationGateway>,
    ) -> Self {
        Self {
            search,
            summarizer,
            categories: config.categories.clone(),
            max_category_workers: config.max_category_workers.max(1),
            category_filter: ConnectivityFilter::new(
                config.category_percentile,
                Some(FilterLimit::MaxCount(config.category_max_per_topic)),
            ),
            topic_filter: ConnectivityFilter::new(
                config.topic_percentile,
                Some(FilterLimit::PreferredCount(config.topic_preferred_count)),
            ),
        }
    }

    pub async fn run(
        &self,
        ctx: &JobCtx,
        handle: &SearchHandle,
        query: &str,
    ) -> GatewayResult<SummaryResult> {
        info!("{} 📥 拉取分析结果 (外部任务 {})", ctx, handle);
        let payload = self.search.fetch_result(handle, query).await?;
        info!(
            "{} ✓ 分析结果: {} 篇文献, {} 个主题",
            ctx,
            payload.papers.len(),
            payload.topic_ids().len()
        );

        let categories = self.summarize_categories(ctx, &payload).await?;
        let topics = topic_flow::summarize_topics(
            ctx,
            self.summarizer.as_ref(),
            &payload,
            self.topic_filter,
            self.max_category_workers,
        )
        .await?;

        info!(
            "{} ✅ 摘要完成: {} 个类别, {} 个主题",
            ctx,
            categories.len(),
            topics.len()
        );
        Ok(SummaryResult { categories, topics })
    }

    /// 每个主题簇挑选连接最紧密的文献，按主题 ID 升序拼接
    pub fn select_documents(&self, payload: &AnalysisPayload) -> Vec<ConnectedDocument> {
        let graph = payload.citation_graph();
        payload
            .topic_ids()
            .into_iter()
            .flat_map(|topic| {
                self.category_filter
                    .apply(&payload.documents_in_topic(topic), &graph)
            })
            .collect()
    }

    /// 类别摘要
    ///
    /// 所有类别的调用都结束后才决定结果，任何一个失败则整体失败
    async fn summarize_categories(
        &self,
        ctx: &JobCtx,
        payload: &AnalysisPayload,
    ) -> GatewayResult<Vec<CategorySummary>> {
        let documents = self.select_documents(payload);
        let connections_by_id: HashMap<String, usize> = documents
            .iter()
            .map(|d| (d.id.clone(), d.connections))
            .collect();
        info!(
            "{} 🧬 提取 {} 个类别的实体 (文献 {} 篇, 并发 {})",
            ctx,
            self.categories.len(),
            documents.len(),
            self.max_category_workers
        );

        // 类别调用都在阶段 future 内执行，阶段超时或被丢弃时一并取消
        let outcomes: Vec<(Category, GatewayResult<Vec<ExtractedEntity>>)> =
            stream::iter(self.categories.iter().copied())
                .map(|category| {
                    let documents = &documents;
                    async move { (category, self.summarizer.summarize(category, documents).await) }
                })
                .buffered(self.max_category_workers)
                .collect()
                .await;

        // 等待全部类别完成后再决定结果
        let mut summaries = Vec::new();
        let mut first_error = None;

        for (category, outcome) in outcomes {
            match outcome {
                Ok(entities) => {
                    info!("{} ✓ 类别 {}: {} 个实体", ctx, category, entities.len());
                    summaries.push(build_category_summary(category, entities, &connections_by_id));
                }
                Err(e) => {
                    error!("{} ❌ 类别 {} 提取失败: {}", ctx, category, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(summaries),
        }
    }
}

/// 计算实体得分、排序并构建共现图
pub fn build_category_summary(
    category: Category,
    extracted: Vec<ExtractedEntity>,
    connections_by_id: &HashMap<String, usize>,
) -> CategorySummary {
    let graph = build_cooccurrence_graph(connections_by_id, &extracted);

    let mut entities: Vec<Entity> = extracted
        .into_iter()
        .map(|e| {
            let total_connections = e
                .cited_in
                .iter()
                .map(|id| document_weight(connections_by_id, id))
                .sum();
            Entity {
                name: e.name,
                context: e.context,
                cited_in: e.cited_in,
                total_connections,
            }
        })
        .collect();
    entities.sort_by(|a, b| b.total_connections.cmp(&a.total_connections));

    CategorySummary {
        category,
        entities,
        graph,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extracted(name: &str, cited_in: &[&str]) -> ExtractedEntity {
        ExtractedEntity {
            name: name.to_string(),
            context: format!("{} context", name),
            cited_in: cited_in.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_entities_sorted_by_total_connections() {
        let connections: HashMap<String, usize> =
            [("D1".to_string(), 2), ("D2".to_string(), 3)].into_iter().collect();
        let summary = build_category_summary(
            Category::Genes,
            vec![
                extracted("A", &["D1"]),
                extracted("B", &["D1", "D2"]),
                extracted("C", &["D2"]),
                extracted("Z", &["unknown"]),
            ],
            &connections,
        );

        let ranked: Vec<(&str, u64)> = summary
            .entities
            .iter()
            .map(|e| (e.name.as_str(), e.total_connections))
            .collect();
        assert_eq!(ranked, vec![("B", 5), ("C", 3), ("A", 2), ("Z", 1)]);
        assert_eq!(summary.graph.weight("A", "B"), Some(2));
        assert_eq!(summary.graph.weight("B", "C"), Some(3));
    }

    #[test]
    fn test_ties_keep_extraction_order() {
        let summary = build_category_summary(
            Category::Proteins,
            vec![extracted("first", &["x"]), extracted("second", &["y"])],
            &HashMap::new(),
        );
        assert_eq!(summary.entities[0].name, "first");
        assert_eq!(summary.entities[1].name, "second");
    }
}
