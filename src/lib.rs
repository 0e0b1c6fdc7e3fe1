//! # Summary Pipeline
//!
//! 文献检索摘要流水线：提交查询后经过多个异步阶段，
//! 得到按类别（基因、物质、疾病、蛋白质）和主题整理的摘要，以及实体共现图。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有任务记录和缓存，只暴露按键读写的能力
//! - `JobStore` - 任务存储，同一任务的修改串行化
//! - `ResultCache` - 已完成任务的快照缓存
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每次调用只处理一个请求
//! - `SearchGateway` / `SemanticGateway` / `SummarizationGateway` - 外部服务接口
//! - `clients/` - 以上接口的 HTTP 实现
//! - `LlmService` - 直接调用 LLM 的摘要实现
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义 Summarize 阶段的完整流程
//! - `JobCtx` - 上下文封装（job_id + stage）
//! - `SummarizeFlow` - 流程编排（拉取结果 → 类别摘要 → 主题摘要）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/pipeline` - 阶段状态机，轮询时推进
//! - `orchestrator/task_pool` - 后台任务池，管理并发和去重
//!
//! 纯计算的算法（连通性过滤、共现图）位于 `analysis/`。
//!
//! ## 模块结构

pub mod analysis;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, SummarizerBackend};
pub use error::{AppError, AppResult, CacheError, ConfigError, GatewayError, GatewayResult};
pub use infrastructure::{FileCacheBackend, JobStore, MemoryCacheBackend, MemoryJobStore, ResultCache};
pub use models::{JobRecord, SearchMode, Stage, StageStatus, SummaryResult};
pub use orchestrator::{Gateways, Orchestrator, PollStatus, SubmitOutcome};
pub use workflow::{JobCtx, SummarizeFlow};
