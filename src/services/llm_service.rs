//! LLM 服务 - 业务能力层
//!
//! 直接调用 LLM 完成实体提取、主题摘要和标题生成，
//! 是 `SummarizationGateway` 的另一种实现（不经过摘要 HTTP 端点）。
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::models::{Category, ConnectedDocument, ExtractedEntity};
use crate::services::gateway::SummarizationGateway;

const ENDPOINT: &str = "llm";

/// 主题摘要的系统提示词
const TOPIC_SUMMARY_PROMPT: &str = "You are a research assistant helping scientists explore papers faster. \
Summarize the submitted text as one coherent story of at most 400 words without a title. \
The text consists of blocks, each starting with a line `PMID=<id>`. \
End every sentence with the IDs of the blocks it is based on, as a comma-separated list in round brackets, \
e.g. (PMID=0000001, PMID=7777777). Never repeat the same ID in one list. Do not hallucinate.";

/// 主题标题的系统提示词
const TOPIC_TITLE_PROMPT: &str = "You are a research assistant. Assign a short representative title \
to the submitted scientific text using the submitted keywords. \
Output exactly one sentence, not in bold. Do not hallucinate.";

/// LLM 服务
///
/// 职责：
/// - 调用 LLM API 完成单次摘要类请求
/// - 清理模型输出（代码块标记）并解析为结构化结果
/// - 不关心任务、阶段和并发
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    /// 单次调用超时
    timeout: Duration,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.llm_model_name.clone(),
            timeout: config.gateway_timeout(),
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息
    /// - `temperature`: 采样温度
    /// - `max_tokens`: 最大输出长度
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（已去掉首尾空白）
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> GatewayResult<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_message)
            .build()
            .map_err(|e| GatewayError::unavailable(ENDPOINT, e))?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| GatewayError::unavailable(ENDPOINT, e))?;

        let messages = vec![
            ChatCompletionRequestMessage::System(system_msg),
            ChatCompletionRequestMessage::User(user_msg),
        ];

        // 构建请求
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(temperature)
            .max_tokens(max_tokens)
            .build()
            .map_err(|e| GatewayError::unavailable(ENDPOINT, e))?;

        // 调用 API（含客户端内部重试在内，总时长不超过 timeout）
        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| {
                warn!("LLM API 调用超时 ({}s)", self.timeout.as_secs());
                GatewayError::unavailable(ENDPOINT, format!("调用超时 ({}s)", self.timeout.as_secs()))
            })?
            .map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                GatewayError::unavailable(ENDPOINT, e)
            })?;

        debug!("LLM API 调用成功");

        // 提取响应内容
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| GatewayError::malformed(ENDPOINT, "LLM 返回内容为空"))?;

        Ok(content.trim().to_string())
    }
}

/// 实体提取的系统提示词
fn extraction_prompt(category: Category) -> String {
    let entity = category.entity_description();
    format!(
        "You are an extraction bot designed for exact [{entity}] extraction from abstracts of scientific papers.\n\
You are given abstracts as a JSON array: [{{\"id\": \"001\", \"abstract\": \"...\"}}, ...].\n\
Extract EVERY [{entity}] name from EVERY abstract and answer with a JSON array of objects:\n\
{{\"name\": \"<{entity} name>\", \"context\": \"<short facts about it, at most 3 sentences>\", \"cited_in\": [\"001\", \"002\"]}}\n\
Names must be unique: aggregate the context from all abstracts mentioning the same name \
and list every paper id where it was mentioned in cited_in.\n\
Don't use internet. Don't hallucinate."
    )
}

/// 主题摘要的输入：每篇文献一段，以 `PMID=<id>` 开头
fn topic_blocks(documents: &[ConnectedDocument]) -> String {
    documents
        .iter()
        .map(|d| format!("\nPMID={}\n{}", d.id, d.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 去掉模型输出中的代码块标记
///
/// 兼容 ```` ```json ... ``` ````、```` json```...``` ```` 和只有反引号的写法
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    if let Ok(re) = Regex::new(r"(?s)^(?:```json|json```)\s*(.*?)\s*(?:```)?$") {
        if let Some(inner) = re.captures(text).and_then(|caps| caps.get(1)) {
            return inner.as_str();
        }
    }
    text.trim_matches('`').trim()
}

/// 解析实体提取结果
fn parse_entities(output: &str) -> GatewayResult<Vec<ExtractedEntity>> {
    let cleaned = strip_code_fences(output);
    serde_json::from_str(cleaned).map_err(|e| {
        warn!("无法解析实体提取结果: {}", e);
        GatewayError::malformed(ENDPOINT, e)
    })
}

#[async_trait]
impl SummarizationGateway for LlmService {
    async fn summarize(
        &self,
        category: Category,
        documents: &[ConnectedDocument],
    ) -> GatewayResult<Vec<ExtractedEntity>> {
        let abstracts = serde_json::to_string_pretty(documents)
            .map_err(|e| GatewayError::malformed(ENDPOINT, e))?;
        let output = self
            .send_to_llm(&abstracts, &extraction_prompt(category), 0.25, 8192)
            .await?;
        let entities = parse_entities(&output)?;
        debug!("类别 {} 提取到 {} 个实体", category, entities.len());
        Ok(entities)
    }

    async fn summarize_topic(&self, documents: &[ConnectedDocument]) -> GatewayResult<String> {
        if documents.is_empty() {
            return Ok(String::new());
        }
        self.send_to_llm(&topic_blocks(documents), TOPIC_SUMMARY_PROMPT, 0.3, 1024)
            .await
    }

    async fn title(&self, summary: &str, keywords: &[String]) -> GatewayResult<String> {
        let message = format!("KEYWORDS: {}\nTEXT:\n{}", keywords.join(","), summary);
        let title = self.send_to_llm(&message, TOPIC_TITLE_PROMPT, 0.01, 64).await?;
        Ok(title.trim_matches('*').trim().to_string())
    }
}
