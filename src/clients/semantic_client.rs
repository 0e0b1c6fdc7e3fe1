//! 语义检索客户端：`GET {url}?user_input=<query>` 返回文献 ID 数组

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::services::gateway::SemanticGateway;

use super::{build_http_client, ensure_success};

const ENDPOINT: &str = "semantic_search";

/// 语义检索客户端
pub struct SemanticClient {
    client: Client,
    url: String,
}

impl SemanticClient {
    pub fn new(config: &Config) -> GatewayResult<Self> {
        Ok(Self {
            client: build_http_client(config.gateway_timeout())?,
            url: config.semantic_search_url.clone(),
        })
    }
}

/// 文献 ID 可能是字符串也可能是数字（PMID）
fn parse_ids(values: Vec<Value>) -> GatewayResult<Vec<String>> {
    values
        .into_iter()
        .map(|v| match v {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(GatewayError::malformed(
                ENDPOINT,
                format!("无法识别的文献 ID: {}", other),
            )),
        })
        .collect()
}

#[async_trait]
impl SemanticGateway for SemanticClient {
    async fn search(&self, query: &str) -> GatewayResult<Vec<String>> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("user_input", query)])
            .send()
            .await
            .map_err(|e| GatewayError::from_reqwest(ENDPOINT, e))?;
        let response = ensure_success(ENDPOINT, response).await?;

        let values: Vec<Value> = response
            .json()
            .await
            .map_err(|e| GatewayError::from_reqwest(ENDPOINT, e))?;
        let ids = parse_ids(values)?;
        debug!("语义检索返回 {} 个文献 ID", ids.len());
        Ok(ids)
    }
}
