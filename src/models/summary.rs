use serde::{Deserialize, Serialize};

use crate::analysis::cooccurrence::CooccurrenceGraph;
use crate::models::category::Category;

/// 摘要服务提取出的实体（原始格式）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub name: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub cited_in: Vec<String>,
}

/// 实体（附带连通度得分）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub context: String,
    pub cited_in: Vec<String>,
    /// 引用该实体的文献连通度之和
    pub total_connections: u64,
}

/// 单个类别的摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: Category,
    /// 按 `total_connections` 降序排列
    pub entities: Vec<Entity>,
    /// 实体共现图，为空表示没有可视化
    pub graph: CooccurrenceGraph,
}

/// 单个主题的摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicSummary {
    /// 展示用编号（主题 ID + 1）
    pub number: usize,
    pub title: String,
    pub summary: String,
    pub keywords: Vec<String>,
    /// 参与摘要的文献数
    pub document_count: usize,
}

/// Summarize 阶段的最终结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub categories: Vec<CategorySummary>,
    pub topics: Vec<TopicSummary>,
}

impl SummaryResult {
    pub fn category(&self, category: Category) -> Option<&CategorySummary> {
        self.categories.iter().find(|c| c.category == category)
    }
}
