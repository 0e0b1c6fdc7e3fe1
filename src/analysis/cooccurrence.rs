//! 实体共现图
//!
//! 把"实体 → 引用文献"列表转换为带权无向图：
//! 两个实体被同一篇文献同时引用时连一条边，权重累加该文献的连通度。

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::models::ExtractedEntity;

/// 文献没有连通度记录时使用的权重
pub const DEFAULT_DOCUMENT_WEIGHT: u64 = 1;

/// 带权边，`source < target`（按名称字典序）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedEdge {
    pub source: String,
    pub target: String,
    pub weight: u64,
}

/// 实体共现图
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooccurrenceGraph {
    /// 节点（已排序）
    pub nodes: Vec<String>,
    /// 边（按 source、target 排序）
    pub edges: Vec<WeightedEdge>,
}

impl CooccurrenceGraph {
    /// 空图表示"没有可视化"
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn weight(&self, a: &str, b: &str) -> Option<u64> {
        let (source, target) = if a <= b { (a, b) } else { (b, a) };
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target)
            .map(|e| e.weight)
    }
}

/// 构建共现图
///
/// 结果与输入的迭代顺序无关；不同实体少于 2 个时返回空图
pub fn build_cooccurrence_graph(
    connections_by_id: &HashMap<String, usize>,
    entities: &[ExtractedEntity],
) -> CooccurrenceGraph {
    // 倒排索引：文献 → 引用它的实体
    let mut document_entities: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for entity in entities {
        for document_id in &entity.cited_in {
            document_entities
                .entry(document_id.as_str())
                .or_default()
                .insert(entity.name.as_str());
        }
    }

    let nodes: BTreeSet<&str> = document_entities.values().flatten().copied().collect();
    if nodes.len() < 2 {
        return CooccurrenceGraph::default();
    }

    let mut weights: BTreeMap<(&str, &str), u64> = BTreeMap::new();
    for (document_id, names) in &document_entities {
        let weight = document_weight(connections_by_id, document_id);
        let names: Vec<&str> = names.iter().copied().collect();
        for (i, &first) in names.iter().enumerate() {
            for &second in &names[i + 1..] {
                *weights.entry((first, second)).or_insert(0) += weight;
            }
        }
    }

    CooccurrenceGraph {
        nodes: nodes.into_iter().map(str::to_string).collect(),
        edges: weights
            .into_iter()
            .map(|((source, target), weight)| WeightedEdge {
                source: source.to_string(),
                target: target.to_string(),
                weight,
            })
            .collect(),
    }
}

/// 文献权重（连通度），缺省为 1
pub fn document_weight(connections_by_id: &HashMap<String, usize>, document_id: &str) -> u64 {
    connections_by_id
        .get(document_id)
        .map_or(DEFAULT_DOCUMENT_WEIGHT, |&c| c as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(name: &str, cited_in: &[&str]) -> ExtractedEntity {
        ExtractedEntity {
            name: name.to_string(),
            context: String::new(),
            cited_in: cited_in.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn scores(pairs: &[(&str, usize)]) -> HashMap<String, usize> {
        pairs.iter().map(|(id, c)| (id.to_string(), *c)).collect()
    }

    #[test]
    fn test_edges_accumulate_document_scores() {
        let entities = vec![
            entity("A", &["D1"]),
            entity("B", &["D1", "D2"]),
            entity("C", &["D2"]),
        ];
        let graph = build_cooccurrence_graph(&scores(&[("D1", 2), ("D2", 3)]), &entities);

        assert_eq!(graph.nodes, vec!["A", "B", "C"]);
        assert_eq!(graph.weight("A", "B"), Some(2));
        assert_eq!(graph.weight("C", "B"), Some(3));
        assert_eq!(graph.weight("A", "C"), None);
        assert_eq!(graph.edges.len(), 2);
    }

    #[test]
    fn test_single_entity_yields_empty_graph() {
        let entities = vec![entity("TP53", &["D1", "D2"])];
        let graph = build_cooccurrence_graph(&scores(&[("D1", 4)]), &entities);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_missing_score_defaults_to_one() {
        let entities = vec![entity("A", &["D9"]), entity("B", &["D9"])];
        let graph = build_cooccurrence_graph(&HashMap::new(), &entities);
        assert_eq!(graph.weight("A", "B"), Some(DEFAULT_DOCUMENT_WEIGHT));
    }

    #[test]
    fn test_isolated_entity_is_a_node_without_edges() {
        let entities = vec![
            entity("A", &["D1"]),
            entity("B", &["D1"]),
            entity("Z", &["D7"]),
        ];
        let graph = build_cooccurrence_graph(&scores(&[("D1", 1)]), &entities);
        assert!(graph.nodes.contains(&"Z".to_string()));
        assert!(graph.edges.iter().all(|e| e.source != "Z" && e.target != "Z"));
    }

    #[test]
    fn test_result_does_not_depend_on_input_order() {
        let forward = vec![
            entity("kras", &["1", "2", "3"]),
            entity("BRAF", &["2", "3"]),
            entity("egfr", &["1", "3"]),
        ];
        let mut backward = forward.clone();
        backward.reverse();
        for e in &mut backward {
            e.cited_in.reverse();
        }
        let connections = scores(&[("1", 5), ("2", 1), ("3", 8)]);

        assert_eq!(
            build_cooccurrence_graph(&connections, &forward),
            build_cooccurrence_graph(&connections, &backward)
        );
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let entities = vec![entity("p53", &["D1"]), entity("P53", &["D1"])];
        let graph = build_cooccurrence_graph(&HashMap::new(), &entities);
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.weight("P53", "p53"), Some(1));
    }
}
