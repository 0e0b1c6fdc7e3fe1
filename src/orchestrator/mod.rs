//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责任务的阶段流转和后台调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `pipeline` - 流水线编排器
//! - 提交查询（新建任务或复用缓存）
//! - 每次轮询推进阶段状态机
//! - 接收后台任务的完成回调，写回任务记录
//! - 摘要完成后写入结果缓存
//!
//! ### `task_pool` - 后台任务池
//! - 控制并发数量（Semaphore）
//! - 按 `(job_id, stage)` 去重
//! - 阶段超时与异常兜底
//! - 关闭时等待已派发的任务
//!
//! ## 层次关系
//!
//! ```text
//! pipeline::Orchestrator (管理 JobRecord 的阶段流转)
//!     ↓
//! task_pool::TaskPool (执行单个阶段的后台任务)
//!     ↓
//! workflow::SummarizeFlow (Summarize 阶段的具体流程)
//!     ↓
//! services (能力层：search / semantic / summarize)
//!     ↓
//! infrastructure (基础设施：JobStore / ResultCache)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一写入口**：任务记录只通过 `JobStore::mutate` 修改
//! 2. **状态只前进**：阶段状态不会回退
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **无业务逻辑**：只做调度，不做具体的分析和摘要

pub mod pipeline;
pub mod task_pool;

// 重新导出主要类型
pub use pipeline::{Gateways, Orchestrator, PollStatus, SubmitOutcome};
pub use task_pool::{CompletionHandler, Dispatch, StageCompletion, StageOutput, TaskPool};
