//! 分析算法（纯计算，无 I/O）
//!
//! - `connectivity` - 按引用图连通性挑选文献
//! - `cooccurrence` - 构建实体共现图

pub mod connectivity;
pub mod cooccurrence;

pub use connectivity::{percentile, ConnectivityFilter, FilterLimit};
pub use cooccurrence::{build_cooccurrence_graph, CooccurrenceGraph, WeightedEdge};
