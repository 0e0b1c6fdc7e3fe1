use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use summary_pipeline::config::Config;
use summary_pipeline::infrastructure::{FileCacheBackend, JobStore, MemoryJobStore, ResultCache};
use summary_pipeline::models::SearchMode;
use summary_pipeline::orchestrator::{Gateways, Orchestrator, PollStatus};
use summary_pipeline::utils::logging;

const USAGE: &str = "用法: summary_pipeline [--semantic] [--config <file>] <query...>";

/// 命令行参数
#[derive(Debug, PartialEq)]
struct CliArgs {
    mode: SearchMode,
    config_path: Option<String>,
    query: String,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs> {
    let mut mode = SearchMode::Text;
    let mut config_path = None;
    let mut words = Vec::new();

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--semantic" => mode = SearchMode::Semantic,
            "--config" => {
                config_path = Some(args.next().context("--config 需要一个文件路径")?);
            }
            "-h" | "--help" => bail!(USAGE),
            _ => words.push(arg),
        }
    }

    let query = words.join(" ");
    if query.trim().is_empty() {
        bail!(USAGE);
    }
    Ok(CliArgs {
        mode,
        config_path,
        query,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    // 加载配置
    let config = match &args.config_path {
        Some(path) => Config::from_file(path)?,
        None => {
            let config = Config::from_env();
            config.validate()?;
            config
        }
    };

    // 初始化日志
    logging::init(config.verbose_logging);
    logging::log_startup(&config);

    // 组装流水线
    let gateways = Gateways::from_config(&config)?;
    let cache = ResultCache::new(Arc::new(FileCacheBackend::new(&config.cache_dir)));
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let poll_interval = config.poll_interval();
    let orchestrator = Orchestrator::new(config, store, cache, gateways);

    let started = Instant::now();
    let job_id = orchestrator.submit(&args.query, args.mode).await?.job_id;

    // 轮询直到结束
    let status = loop {
        let status = orchestrator.advance(&job_id).await;
        if let PollStatus::Pending { progress } = &status {
            logging::log_progress(&job_id, progress);
        }
        if status.is_terminal() {
            break status;
        }
        tokio::time::sleep(poll_interval).await;
    };

    let result = match status {
        PollStatus::Success { .. } => {
            let record = orchestrator.snapshot(&job_id)?;
            logging::print_final_stats(&record, started.elapsed());
            let summary = record
                .results
                .summary
                .as_ref()
                .context("任务已完成但缺少摘要结果")?;
            println!("{}", serde_json::to_string_pretty(summary)?);
            Ok(())
        }
        PollStatus::Failed => Err(anyhow!("❌ 任务 {} 失败，详见日志", job_id)),
        PollStatus::NotFound => Err(anyhow!("任务 {} 不存在（可能已过期）", job_id)),
        PollStatus::Pending { .. } => Err(anyhow!("任务 {} 仍在进行中", job_id)),
    };

    orchestrator.shutdown().await;
    result
}
