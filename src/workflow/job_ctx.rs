//! 任务处理上下文
//!
//! 封装"我正在处理哪个任务的哪个阶段"这一信息，用作日志前缀

use std::fmt::Display;

use crate::models::Stage;

/// 任务处理上下文
#[derive(Debug, Clone)]
pub struct JobCtx {
    /// 任务 ID
    pub job_id: String,

    /// 当前阶段（仅用于日志显示）
    pub stage: Option<Stage>,
}

impl JobCtx {
    /// 创建新的任务上下文
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            stage: None,
        }
    }

    /// 附带阶段信息
    pub fn with_stage(&self, stage: Stage) -> Self {
        Self {
            job_id: self.job_id.clone(),
            stage: Some(stage),
        }
    }
}

impl Display for JobCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.stage {
            Some(stage) => write!(f, "[任务 {} 阶段#{:?}]", self.job_id, stage),
            None => write!(f, "[任务 {}]", self.job_id),
        }
    }
}
