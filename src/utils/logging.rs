//! 日志工具模块
//!
//! 提供日志初始化、格式化和输出的辅助函数

use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::{JobRecord, StageProgress, StageStatus};

/// 初始化日志
///
/// 优先使用 `RUST_LOG`，否则按 `verbose` 选择 `debug` 或 `info`
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 文献摘要流水线");
    info!("🔗 检索服务: {}", config.search_api_base_url);
    info!("🧠 摘要后端: {:?}", config.summarizer_backend);
    info!(
        "📊 后台任务上限: {}, 类别并发: {}",
        config.max_background_tasks, config.max_category_workers
    );
    info!("{}", "=".repeat(60));
}

/// 记录阶段进度
///
/// 例如 `[任务 abc] ✓ Starting analysis | ⏳ Waiting for the analysis results | · Building summaries for categories`
pub fn log_progress(job_id: &str, progress: &StageProgress) {
    let line = progress
        .entries()
        .iter()
        .map(|entry| {
            let mark = match entry.status {
                StageStatus::NotStarted => "·",
                StageStatus::Pending => "⏳",
                StageStatus::Complete => "✓",
                StageStatus::Error => "❌",
            };
            format!("{} {}", mark, entry.stage.label())
        })
        .collect::<Vec<_>>()
        .join(" | ");
    info!("[任务 {}] {}", job_id, line);
}

/// 打印最终统计信息
pub fn print_final_stats(record: &JobRecord, elapsed: Duration) {
    info!("\n{}", "=".repeat(60));
    info!("📊 摘要完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("查询: {} ({})", truncate_text(&record.query, 60), record.mode);
    let Some(summary) = record.results.summary.as_ref() else {
        info!("⚠️ 没有摘要结果");
        return;
    };
    for category in &summary.categories {
        info!(
            "🧬 {}: {} 个实体, 共现图 {} 个节点 / {} 条边",
            category.category,
            category.entities.len(),
            category.graph.nodes.len(),
            category.graph.edges.len()
        );
    }
    info!("📝 主题: {} 个", summary.topics.len());
    info!("⏱️ 用时: {:.1}s", elapsed.as_secs_f64());
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
