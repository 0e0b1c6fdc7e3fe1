use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// 文献（论文）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// 摘要正文
    #[serde(rename = "abstract", alias = "content", default)]
    pub content: String,
    /// 所属主题簇
    #[serde(alias = "comp", default)]
    pub topic: usize,
}

/// 经过连通性过滤的文献，附带其在引用图中的度数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedDocument {
    pub id: String,
    #[serde(rename = "abstract")]
    pub content: String,
    #[serde(skip_serializing, default)]
    pub connections: usize,
}

/// 主题描述（外部分析给出的关键词）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicDescription {
    pub topic: usize,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// 外部深度分析的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub papers: Vec<Document>,
    /// 引用图的边（无向）
    #[serde(default)]
    pub edges: Vec<(String, String)>,
    #[serde(default)]
    pub topics: Vec<TopicDescription>,
}

impl AnalysisPayload {
    /// 检查必要字段
    pub fn validate(&self) -> Result<(), String> {
        if let Some(doc) = self.papers.iter().find(|d| d.id.trim().is_empty()) {
            return Err(format!("文献缺少 id (topic={})", doc.topic));
        }
        Ok(())
    }

    /// 全部主题 ID（升序）
    pub fn topic_ids(&self) -> Vec<usize> {
        let ids: BTreeSet<usize> = self.papers.iter().map(|d| d.topic).collect();
        ids.into_iter().collect()
    }

    /// 某主题下的文献，保持原始顺序
    pub fn documents_in_topic(&self, topic: usize) -> Vec<Document> {
        self.papers.iter().filter(|d| d.topic == topic).cloned().collect()
    }

    /// 某主题的关键词，没有描述时为空
    pub fn keywords_for(&self, topic: usize) -> Vec<String> {
        self.topics
            .iter()
            .find(|t| t.topic == topic)
            .map(|t| t.keywords.clone())
            .unwrap_or_default()
    }

    pub fn citation_graph(&self) -> CitationGraph {
        CitationGraph::from_edges(&self.edges)
    }
}

/// 引用图（邻接表）
#[derive(Debug, Clone, Default)]
pub struct CitationGraph {
    neighbors: HashMap<String, HashSet<String>>,
}

impl CitationGraph {
    pub fn from_edges(edges: &[(String, String)]) -> Self {
        let mut graph = Self::default();
        for (a, b) in edges {
            graph.add_edge(a, b);
        }
        graph
    }

    pub fn add_edge(&mut self, a: &str, b: &str) {
        self.neighbors
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string());
        self.neighbors
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string());
    }

    /// 文献的度数（邻居数），不在图中的文献为 0
    pub fn degree(&self, id: &str) -> usize {
        self.neighbors.get(id).map_or(0, HashSet::len)
    }
}
