use std::sync::Arc;

use summary_pipeline::config::Config;
use summary_pipeline::infrastructure::{FileCacheBackend, MemoryJobStore, ResultCache};
use summary_pipeline::models::SearchMode;
use summary_pipeline::orchestrator::{Gateways, Orchestrator, PollStatus};
use summary_pipeline::utils::logging;

#[tokio::test]
#[ignore] // 默认忽略，需要真实的外部服务：cargo test -- --ignored
async fn test_live_text_query() {
    // 初始化日志
    logging::init(true);

    // 加载配置
    let config = Config::from_env();
    let cache_dir = tempfile::tempdir().expect("创建临时目录失败");

    let gateways = Gateways::from_config(&config).expect("创建外部服务客户端失败");
    let cache = ResultCache::new(Arc::new(FileCacheBackend::new(cache_dir.path())));
    let poll_interval = config.poll_interval();
    let orchestrator = Orchestrator::new(config, Arc::new(MemoryJobStore::new()), cache, gateways);

    let outcome = orchestrator
        .submit("p53 tumor suppression", SearchMode::Text)
        .await
        .expect("提交任务失败");

    let status = loop {
        let status = orchestrator.advance(&outcome.job_id).await;
        if status.is_terminal() {
            break status;
        }
        tokio::time::sleep(poll_interval).await;
    };
    orchestrator.shutdown().await;

    assert!(matches!(status, PollStatus::Success { .. }), "任务失败: {:?}", status);
    let record = orchestrator.snapshot(&outcome.job_id).expect("读取任务失败");
    let summary = record.results.summary.expect("缺少摘要结果");
    println!("类别: {}, 主题: {}", summary.categories.len(), summary.topics.len());
}
