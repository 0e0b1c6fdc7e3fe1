//! 连通性过滤
//!
//! 按文献在引用图中的度数挑选"连接最紧密"的一部分文献，
//! 用来控制送去摘要的数据量。

use crate::models::{CitationGraph, ConnectedDocument, Document};

/// 过滤结果的数量限制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterLimit {
    /// 硬上限：超过时只保留度数最高的 n 篇
    MaxCount(usize),
    /// 期望数量：文献不足 n 篇时全部保留，否则至少保留 n 篇（同时也是上限）
    PreferredCount(usize),
}

impl FilterLimit {
    fn count(self) -> usize {
        match self {
            FilterLimit::MaxCount(n) | FilterLimit::PreferredCount(n) => n,
        }
    }
}

/// 连通性过滤参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectivityFilter {
    /// 百分位阈值（0–100）
    pub percentile: f64,
    pub limit: Option<FilterLimit>,
}

impl ConnectivityFilter {
    pub fn new(percentile: f64, limit: Option<FilterLimit>) -> Self {
        Self { percentile, limit }
    }

    /// 执行过滤
    ///
    /// 返回的文献保持原始顺序；触发数量限制时按 `connections` 降序排列（稳定排序）
    pub fn apply(&self, documents: &[Document], graph: &CitationGraph) -> Vec<ConnectedDocument> {
        if documents.is_empty() || self.limit.map(FilterLimit::count) == Some(0) {
            return Vec::new();
        }

        // 1. 计算度数
        let degrees: Vec<usize> = documents.iter().map(|d| graph.degree(&d.id)).collect();

        // 2. 计算阈值
        let threshold = self.threshold(&degrees);

        // 3. 保留度数不低于阈值的文献
        let mut kept: Vec<ConnectedDocument> = documents
            .iter()
            .zip(&degrees)
            .filter(|(_, &degree)| degree as f64 >= threshold)
            .map(|(doc, &degree)| ConnectedDocument {
                id: doc.id.clone(),
                content: doc.content.clone(),
                connections: degree,
            })
            .collect();

        // 4. 超过数量限制时取度数最高的前 n 篇
        if let Some(limit) = self.limit {
            let n = limit.count();
            if kept.len() > n {
                kept.sort_by(|a, b| b.connections.cmp(&a.connections));
                kept.truncate(n);
            }
        }

        kept
    }

    fn threshold(&self, degrees: &[usize]) -> f64 {
        let by_percentile = percentile(degrees, self.percentile).unwrap_or(0.0);

        match self.limit {
            Some(FilterLimit::PreferredCount(n)) => {
                if degrees.len() <= n {
                    // 小主题全部保留
                    degrees.iter().copied().min().unwrap_or(0) as f64
                } else {
                    let mut sorted = degrees.to_vec();
                    sorted.sort_unstable_by(|a, b| b.cmp(a));
                    by_percentile.min(sorted[n - 1] as f64)
                }
            }
            _ => by_percentile,
        }
    }
}

/// 百分位数（最近秩之间线性插值）
///
/// `p` 超出 0–100 时按边界处理；空输入返回 `None`
pub fn percentile(values: &[usize], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let low = sorted[lower] as f64;
    let high = sorted[upper] as f64;
    Some(low + (high - low) * (rank - lower as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, topic: usize) -> Document {
        Document {
            id: id.to_string(),
            content: format!("abstract {}", id),
            topic,
        }
    }

    /// 构造度数依次为 1..=n 的文献：第 i 篇连接 i 个独立的叶子节点
    fn star_documents(n: usize) -> (Vec<Document>, CitationGraph) {
        let mut graph = CitationGraph::default();
        let mut docs = Vec::new();
        for i in 1..=n {
            let id = format!("d{}", i);
            for leaf in 0..i {
                graph.add_edge(&id, &format!("leaf-{}-{}", i, leaf));
            }
            docs.push(doc(&id, 0));
        }
        (docs, graph)
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        assert_eq!(percentile(&[1, 2, 3, 4], 50.0), Some(2.5));
        assert_eq!(percentile(&[10], 90.0), Some(10.0));
        assert_eq!(percentile(&[3, 3, 3], 75.0), Some(3.0));
        assert_eq!(percentile(&[1, 5], 0.0), Some(1.0));
        assert_eq!(percentile(&[1, 5], 100.0), Some(5.0));
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn test_percentile_90_keeps_top_decile() {
        let (docs, graph) = star_documents(100);
        let kept = ConnectivityFilter::new(90.0, None).apply(&docs, &graph);

        // 第 90 百分位 = 90.1，保留度数 91..=100
        assert_eq!(kept.len(), 10);
        assert!(kept.iter().all(|d| d.connections >= 91));
        assert_eq!(kept[0].id, "d91");
    }

    #[test]
    fn test_max_count_keeps_highest_degrees() {
        let (docs, graph) = star_documents(100);
        let kept =
            ConnectivityFilter::new(90.0, Some(FilterLimit::MaxCount(5))).apply(&docs, &graph);

        let ids: Vec<&str> = kept.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d100", "d99", "d98", "d97", "d96"]);
    }

    #[test]
    fn test_small_set_with_preferred_count_keeps_everything() {
        let mut graph = CitationGraph::default();
        graph.add_edge("a", "b");
        graph.add_edge("a", "c");
        let docs = vec![doc("a", 0), doc("b", 0), doc("c", 0)];

        let kept = ConnectivityFilter::new(99.0, Some(FilterLimit::PreferredCount(50)))
            .apply(&docs, &graph);

        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].connections, 2);
        assert_eq!(kept[1].connections, 1);
    }

    #[test]
    fn test_preferred_count_lowers_percentile_threshold() {
        let (docs, graph) = star_documents(100);
        // 第 90 百分位只留下 10 篇，期望数量 20 把阈值降到第 20 高的度数
        let kept = ConnectivityFilter::new(90.0, Some(FilterLimit::PreferredCount(20)))
            .apply(&docs, &graph);

        assert_eq!(kept.len(), 20);
        assert!(kept.iter().all(|d| d.connections >= 81));
    }

    #[test]
    fn test_ties_keep_input_order() {
        let mut graph = CitationGraph::default();
        for id in ["x", "y", "z"] {
            graph.add_edge(id, "hub");
        }
        graph.add_edge("w", "hub");
        graph.add_edge("w", "other");
        let docs = vec![doc("x", 0), doc("y", 0), doc("w", 0), doc("z", 0)];

        let kept =
            ConnectivityFilter::new(0.0, Some(FilterLimit::MaxCount(3))).apply(&docs, &graph);

        let ids: Vec<&str> = kept.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["w", "x", "y"]);
    }

    #[test]
    fn test_documents_outside_graph_have_zero_degree() {
        let graph = CitationGraph::default();
        let docs = vec![doc("lonely", 0), doc("alone", 0)];
        let kept = ConnectivityFilter::new(75.0, Some(FilterLimit::MaxCount(5))).apply(&docs, &graph);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|d| d.connections == 0));
    }

    #[test]
    fn test_empty_input() {
        let graph = CitationGraph::default();
        assert!(ConnectivityFilter::new(50.0, Some(FilterLimit::PreferredCount(50)))
            .apply(&[], &graph)
            .is_empty());
    }
}
