//! 任务记录与阶段状态机的数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::summary::SummaryResult;

/// 搜索模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// 直接文本检索
    Text,
    /// 先做语义检索，再用得到的文献 ID 做分析
    Semantic,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Text => "text",
            SearchMode::Semantic => "semantic",
        }
    }

    /// 该模式下的阶段顺序
    pub fn stages(self) -> &'static [Stage] {
        match self {
            SearchMode::Text => &[Stage::Start, Stage::PrimarySearch, Stage::Summarize],
            SearchMode::Semantic => &[
                Stage::Start,
                Stage::SemanticSearch,
                Stage::PrimarySearch,
                Stage::Summarize,
            ],
        }
    }
}

impl std::str::FromStr for SearchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(SearchMode::Text),
            "semantic" => Ok(SearchMode::Semantic),
            _ => Err(ConfigError::InvalidValue {
                name: "search_mode".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    SemanticSearch,
    PrimarySearch,
    Summarize,
}

impl Stage {
    /// 展示给用户的阶段说明
    pub fn label(self) -> &'static str {
        match self {
            Stage::Start => "Starting analysis",
            Stage::SemanticSearch => "Semantic search",
            Stage::PrimarySearch => "Waiting for the analysis results",
            Stage::Summarize => "Building summaries for categories",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// 阶段状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    NotStarted,
    Pending,
    Complete,
    Error,
}

impl StageStatus {
    /// 状态的先后次序，`Complete` 与 `Error` 同为终态
    fn rank(self) -> u8 {
        match self {
            StageStatus::NotStarted => 0,
            StageStatus::Pending => 1,
            StageStatus::Complete | StageStatus::Error => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 2
    }
}

/// 单个阶段的进度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEntry {
    pub stage: Stage,
    pub status: StageStatus,
}

/// 阶段进度表
///
/// 创建后阶段集合与顺序固定，只有状态会变化，且状态只前进不后退
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageProgress {
    entries: Vec<StageEntry>,
}

impl StageProgress {
    /// 按搜索模式创建，全部阶段为 `NotStarted`
    pub fn for_mode(mode: SearchMode) -> Self {
        Self {
            entries: mode
                .stages()
                .iter()
                .map(|&stage| StageEntry {
                    stage,
                    status: StageStatus::NotStarted,
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[StageEntry] {
        &self.entries
    }

    pub fn status(&self, stage: Stage) -> Option<StageStatus> {
        self.entries.iter().find(|e| e.stage == stage).map(|e| e.status)
    }

    /// 推进某个阶段的状态
    ///
    /// 返回是否发生了变化；不存在的阶段、回退或终态之间的切换都会被拒绝
    pub fn advance(&mut self, stage: Stage, status: StageStatus) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.stage == stage) else {
            return false;
        };
        if status.rank() <= entry.status.rank() {
            return false;
        }
        entry.status = status;
        true
    }

    /// 当前阶段：`Start` 之后第一个尚未完成的阶段
    pub fn current(&self) -> Option<StageEntry> {
        self.entries
            .iter()
            .filter(|e| e.stage != Stage::Start)
            .find(|e| e.status != StageStatus::Complete)
            .copied()
    }

    /// 某阶段的前一个阶段
    pub fn previous(&self, stage: Stage) -> Option<Stage> {
        let index = self.entries.iter().position(|e| e.stage == stage)?;
        index.checked_sub(1).map(|i| self.entries[i].stage)
    }

    pub fn has_error(&self) -> bool {
        self.entries.iter().any(|e| e.status == StageStatus::Error)
    }

    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|e| e.status == StageStatus::Complete)
    }

    /// 阶段集合是否与搜索模式一致
    pub fn matches_mode(&self, mode: SearchMode) -> bool {
        self.entries.iter().map(|e| e.stage).eq(mode.stages().iter().copied())
    }
}

/// 外部搜索服务返回的任务句柄
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchHandle(pub String);

impl std::fmt::Display for SearchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 各阶段完成后写入的结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageResults {
    /// 语义检索得到的文献 ID（按相关度排序）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_ids: Option<Vec<String>>,
    /// 最终摘要
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryResult>,
}

/// 任务记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub query: String,
    pub mode: SearchMode,
    pub created_at: DateTime<Utc>,
    pub progress: StageProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_handle: Option<SearchHandle>,
    #[serde(default)]
    pub results: StageResults,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
}

impl JobRecord {
    /// 创建新任务，ID 为随机 UUID
    pub fn new(query: impl Into<String>, mode: SearchMode) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), query, mode)
    }

    pub fn with_id(job_id: impl Into<String>, query: impl Into<String>, mode: SearchMode) -> Self {
        Self {
            job_id: job_id.into(),
            query: query.into(),
            mode,
            created_at: Utc::now(),
            progress: StageProgress::for_mode(mode),
            search_handle: None,
            results: StageResults::default(),
            cache_key: None,
        }
    }

    /// 记录是否可以直接展示（全部阶段完成且摘要存在）
    pub fn is_complete(&self) -> bool {
        self.progress.matches_mode(self.mode)
            && self.progress.is_complete()
            && self.results.summary.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_mode_parses_case_insensitively() {
        assert_eq!(" Semantic ".parse::<SearchMode>().ok(), Some(SearchMode::Semantic));
        assert_eq!("text".parse::<SearchMode>().ok(), Some(SearchMode::Text));
        assert!("fuzzy".parse::<SearchMode>().is_err());
    }

    #[test]
    fn test_stage_layout_depends_on_mode() {
        let text = StageProgress::for_mode(SearchMode::Text);
        let stages: Vec<Stage> = text.entries().iter().map(|e| e.stage).collect();
        assert_eq!(stages, vec![Stage::Start, Stage::PrimarySearch, Stage::Summarize]);

        let semantic = StageProgress::for_mode(SearchMode::Semantic);
        assert_eq!(semantic.entries().len(), 4);
        assert_eq!(semantic.entries()[1].stage, Stage::SemanticSearch);
        assert!(semantic
            .entries()
            .iter()
            .all(|e| e.status == StageStatus::NotStarted));
    }

    #[test]
    fn test_status_never_regresses() {
        let mut progress = StageProgress::for_mode(SearchMode::Text);
        assert!(progress.advance(Stage::PrimarySearch, StageStatus::Pending));
        assert!(progress.advance(Stage::PrimarySearch, StageStatus::Complete));

        assert!(!progress.advance(Stage::PrimarySearch, StageStatus::Pending));
        assert!(!progress.advance(Stage::PrimarySearch, StageStatus::NotStarted));
        assert!(!progress.advance(Stage::PrimarySearch, StageStatus::Error));
        assert_eq!(progress.status(Stage::PrimarySearch), Some(StageStatus::Complete));
    }

    #[test]
    fn test_error_is_terminal() {
        let mut progress = StageProgress::for_mode(SearchMode::Text);
        assert!(progress.advance(Stage::Summarize, StageStatus::Error));
        assert!(!progress.advance(Stage::Summarize, StageStatus::Complete));
        assert!(progress.has_error());
    }

    #[test]
    fn test_unknown_stage_is_rejected() {
        let mut progress = StageProgress::for_mode(SearchMode::Text);
        assert!(!progress.advance(Stage::SemanticSearch, StageStatus::Pending));
        assert_eq!(progress.status(Stage::SemanticSearch), None);
    }

    #[test]
    fn test_current_skips_start() {
        let mut progress = StageProgress::for_mode(SearchMode::Semantic);
        assert_eq!(progress.current().map(|e| e.stage), Some(Stage::SemanticSearch));
        assert_eq!(progress.previous(Stage::SemanticSearch), Some(Stage::Start));
        assert_eq!(progress.previous(Stage::Start), None);

        progress.advance(Stage::SemanticSearch, StageStatus::Complete);
        assert_eq!(progress.current().map(|e| e.stage), Some(Stage::PrimarySearch));
    }

    #[test]
    fn test_record_serializes_progress_in_order() {
        let record = JobRecord::with_id("job-1", "p53", SearchMode::Text);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["mode"], "text");
        assert_eq!(json["progress"][0]["stage"], "start");
        assert_eq!(json["progress"][1]["status"], "not_started");

        let back: JobRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
