//! 摘要服务客户端
//!
//! - 实体提取：`POST {categories_url}?si_mode=<MODE>`，正文为 `[{id, abstract}]`
//! - 主题摘要：`POST {topic_url}`，正文 `{"abstracts": [...]}`，返回 `{"summary"}`
//! - 主题标题：`POST {title_url}`，正文 `{"summary", "topics_keywords"}`，返回 `{"title"}`

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::models::{Category, ConnectedDocument, ExtractedEntity};
use crate::services::gateway::SummarizationGateway;

use super::{build_http_client, ensure_success};

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TitleResponse {
    title: Option<String>,
}

/// 摘要服务客户端
pub struct SummarizeClient {
    client: Client,
    categories_url: String,
    topic_url: String,
    title_url: String,
}

impl SummarizeClient {
    pub fn new(config: &Config) -> GatewayResult<Self> {
        Ok(Self {
            client: build_http_client(config.gateway_timeout())?,
            categories_url: config.summarize_categories_url.clone(),
            topic_url: config.summarize_topic_url.clone(),
            title_url: config.topic_title_url.clone(),
        })
    }

    async fn post_json<B, T>(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
        body: &B,
    ) -> GatewayResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = request
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::from_reqwest(endpoint, e))?;
        let response = ensure_success(endpoint, response).await?;
        response
            .json()
            .await
            .map_err(|e| GatewayError::from_reqwest(endpoint, e))
    }
}

#[async_trait]
impl SummarizationGateway for SummarizeClient {
    async fn summarize(
        &self,
        category: Category,
        documents: &[ConnectedDocument],
    ) -> GatewayResult<Vec<ExtractedEntity>> {
        let endpoint = format!("summarize_categories:{}", category.si_mode());
        let request = self
            .client
            .post(&self.categories_url)
            .query(&[("si_mode", category.si_mode())]);
        let entities: Vec<ExtractedEntity> = self.post_json(&endpoint, request, documents).await?;
        debug!("类别 {} 提取到 {} 个实体", category, entities.len());
        Ok(entities)
    }

    async fn summarize_topic(&self, documents: &[ConnectedDocument]) -> GatewayResult<String> {
        const ENDPOINT: &str = "summarize_topic";
        let request = self.client.post(&self.topic_url);
        let parsed: SummaryResponse = self
            .post_json(ENDPOINT, request, &json!({ "abstracts": documents }))
            .await?;
        parsed
            .summary
            .ok_or_else(|| GatewayError::malformed(ENDPOINT, "响应缺少 summary"))
    }

    async fn title(&self, summary: &str, keywords: &[String]) -> GatewayResult<String> {
        const ENDPOINT: &str = "topic_title";
        let request = self.client.post(&self.title_url);
        let parsed: TitleResponse = self
            .post_json(
                ENDPOINT,
                request,
                &json!({ "summary": summary, "topics_keywords": keywords }),
            )
            .await?;
        parsed
            .title
            .map(|t| t.trim().to_string())
            .ok_or_else(|| GatewayError::malformed(ENDPOINT, "响应缺少 title"))
    }
}
