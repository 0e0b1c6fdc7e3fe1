use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::models::Category;

/// 摘要服务的实现方式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarizerBackend {
    /// 调用部署好的摘要 HTTP 端点
    Http,
    /// 直接调用兼容 OpenAI API 的 LLM
    Llm,
}

impl SummarizerBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "http" => Some(SummarizerBackend::Http),
            "llm" => Some(SummarizerBackend::Llm),
            _ => None,
        }
    }
}

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 外部搜索 / 分析服务 ---
    pub search_api_base_url: String,
    pub semantic_search_url: String,
    // --- 摘要服务 ---
    pub summarizer_backend: SummarizerBackend,
    pub summarize_categories_url: String,
    pub summarize_topic_url: String,
    pub topic_title_url: String,
    /// 需要提取的实体类别
    pub categories: Vec<Category>,
    // --- LLM 配置（summarizer_backend = "llm" 时使用） ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    // --- 超时与并发 ---
    /// 单次外部调用超时（秒）
    pub gateway_timeout_secs: u64,
    /// 单个后台阶段的总超时（秒）
    pub stage_timeout_secs: u64,
    /// 任务保留时长（秒），超过后被淘汰
    pub job_ttl_secs: u64,
    /// 类别摘要同时调用的数量
    pub max_category_workers: usize,
    /// 后台任务池大小
    pub max_background_tasks: usize,
    // --- 连通性过滤参数 ---
    pub category_percentile: f64,
    pub category_max_per_topic: usize,
    pub topic_percentile: f64,
    pub topic_preferred_count: usize,
    // --- 其他 ---
    /// 结果缓存目录
    pub cache_dir: String,
    /// 命令行轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_api_base_url: "http://localhost:5000".to_string(),
            semantic_search_url: "http://localhost:8081/semantic_search".to_string(),
            summarizer_backend: SummarizerBackend::Http,
            summarize_categories_url: "http://localhost:8082/extract_entities".to_string(),
            summarize_topic_url: "http://localhost:8083/summarize_topic".to_string(),
            topic_title_url: "http://localhost:8084/topic_title".to_string(),
            categories: Category::ALL.to_vec(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            gateway_timeout_secs: 120,
            stage_timeout_secs: 1800,
            job_ttl_secs: 24 * 60 * 60,
            max_category_workers: 4,
            max_background_tasks: 16,
            category_percentile: 80.0,
            category_max_per_topic: 5,
            topic_percentile: 50.0,
            topic_preferred_count: 50,
            cache_dir: "cache".to_string(),
            poll_interval_ms: 2000,
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            search_api_base_url: std::env::var("SEARCH_API_BASE_URL").unwrap_or(default.search_api_base_url),
            semantic_search_url: std::env::var("SEMANTIC_SEARCH_URL").unwrap_or(default.semantic_search_url),
            summarizer_backend: std::env::var("SUMMARIZER_BACKEND").ok().and_then(|v| SummarizerBackend::parse(&v)).unwrap_or(default.summarizer_backend),
            summarize_categories_url: std::env::var("SUMMARIZE_CATEGORIES_URL").unwrap_or(default.summarize_categories_url),
            summarize_topic_url: std::env::var("SUMMARIZE_TOPIC_URL").unwrap_or(default.summarize_topic_url),
            topic_title_url: std::env::var("TOPIC_TITLE_URL").unwrap_or(default.topic_title_url),
            categories: std::env::var("CATEGORIES").ok().and_then(|v| parse_categories(&v)).unwrap_or(default.categories),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            gateway_timeout_secs: std::env::var("GATEWAY_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.gateway_timeout_secs),
            stage_timeout_secs: std::env::var("STAGE_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.stage_timeout_secs),
            job_ttl_secs: std::env::var("JOB_TTL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.job_ttl_secs),
            max_category_workers: std::env::var("MAX_CATEGORY_WORKERS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_category_workers),
            max_background_tasks: std::env::var("MAX_BACKGROUND_TASKS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_background_tasks),
            category_percentile: std::env::var("CATEGORY_PERCENTILE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.category_percentile),
            category_max_per_topic: std::env::var("CATEGORY_MAX_PER_TOPIC").ok().and_then(|v| v.parse().ok()).unwrap_or(default.category_max_per_topic),
            topic_percentile: std::env::var("TOPIC_PERCENTILE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.topic_percentile),
            topic_preferred_count: std::env::var("TOPIC_PREFERRED_COUNT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.topic_preferred_count),
            cache_dir: std::env::var("CACHE_DIR").unwrap_or(default.cache_dir),
            poll_interval_ms: std::env::var("POLL_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.poll_interval_ms),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
        }
    }

    /// 从 TOML 文件加载配置，未出现的字段使用默认值
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 检查取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.category_percentile) {
            return Err(invalid("category_percentile", self.category_percentile));
        }
        if !(0.0..=100.0).contains(&self.topic_percentile) {
            return Err(invalid("topic_percentile", self.topic_percentile));
        }
        if self.max_category_workers == 0 {
            return Err(invalid("max_category_workers", self.max_category_workers));
        }
        if self.max_background_tasks == 0 {
            return Err(invalid("max_background_tasks", self.max_background_tasks));
        }
        if self.categories.is_empty() {
            return Err(invalid("categories", "[]"));
        }
        Ok(())
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }

    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn invalid(name: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    }
}

/// 解析逗号分隔的类别列表，例如 `genes,proteins`
fn parse_categories(value: &str) -> Option<Vec<Category>> {
    let categories: Option<Vec<Category>> = value
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<Category>().ok())
        .collect();
    categories.filter(|c| !c.is_empty())
}
