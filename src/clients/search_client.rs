//! 外部搜索 / 深度分析服务客户端
//!
//! 接口：
//! - `POST {base}/search_terms_api`      提交检索，返回 `{"success", "jobid"}`
//! - `POST {base}/search_paper_ids_api`  提交文献 ID 列表
//! - `GET  {base}/check_status_api/{id}` 查询状态
//! - `GET  {base}/get_result_api?jobid=&query=` 拉取分析结果

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::models::{AnalysisPayload, SearchHandle};
use crate::services::gateway::{SearchGateway, SearchState};

use super::{build_http_client, ensure_success};

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    success: bool,
    jobid: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

/// 搜索服务客户端
pub struct SearchClient {
    client: Client,
    base_url: String,
}

impl SearchClient {
    pub fn new(config: &Config) -> GatewayResult<Self> {
        Ok(Self {
            client: build_http_client(config.gateway_timeout())?,
            base_url: config.search_api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_submit(&self, endpoint: &str, body: serde_json::Value) -> GatewayResult<SubmitResponse> {
        let response = self
            .client
            .post(self.url(endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::from_reqwest(endpoint, e))?;
        let response = ensure_success(endpoint, response).await?;

        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::from_reqwest(endpoint, e))?;
        if !parsed.success {
            return Err(GatewayError::rejected(endpoint, None, parsed.message));
        }
        Ok(parsed)
    }
}

/// 解析外部服务的状态字符串
fn parse_state(status: &str) -> Option<SearchState> {
    match status.trim().to_lowercase().as_str() {
        "success" | "complete" | "completed" => Some(SearchState::Success),
        "pending" | "progress" | "started" | "queued" => Some(SearchState::Pending),
        "failure" | "failed" | "error" => Some(SearchState::Failed),
        _ => None,
    }
}

#[async_trait]
impl SearchGateway for SearchClient {
    async fn submit(&self, query: &str) -> GatewayResult<SearchHandle> {
        const ENDPOINT: &str = "search_terms_api";
        let parsed = self.post_submit(ENDPOINT, json!({ "query": query })).await?;
        let jobid = parsed
            .jobid
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| GatewayError::malformed(ENDPOINT, "响应缺少 jobid"))?;
        debug!("外部检索已提交: {}", jobid);
        Ok(SearchHandle(jobid))
    }

    async fn submit_with_ids(
        &self,
        handle: &SearchHandle,
        query: &str,
        ids: &[String],
    ) -> GatewayResult<()> {
        const ENDPOINT: &str = "search_paper_ids_api";
        self.post_submit(
            ENDPOINT,
            json!({ "jobid": handle.0, "query": query, "paper_ids": ids }),
        )
        .await?;
        debug!("已提交 {} 个文献 ID 到任务 {}", ids.len(), handle);
        Ok(())
    }

    async fn poll(&self, handle: &SearchHandle) -> GatewayResult<SearchState> {
        const ENDPOINT: &str = "check_status_api";
        let response = self
            .client
            .get(self.url(&format!("{}/{}", ENDPOINT, handle)))
            .send()
            .await
            .map_err(|e| GatewayError::from_reqwest(ENDPOINT, e))?;
        let response = ensure_success(ENDPOINT, response).await?;

        let parsed: StatusResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::from_reqwest(ENDPOINT, e))?;
        parse_state(&parsed.status)
            .ok_or_else(|| GatewayError::malformed(ENDPOINT, format!("未知状态: {}", parsed.status)))
    }

    async fn fetch_result(
        &self,
        handle: &SearchHandle,
        query: &str,
    ) -> GatewayResult<AnalysisPayload> {
        const ENDPOINT: &str = "get_result_api";
        let response = self
            .client
            .get(self.url(ENDPOINT))
            .query(&[("jobid", handle.0.as_str()), ("query", query)])
            .send()
            .await
            .map_err(|e| GatewayError::from_reqwest(ENDPOINT, e))?;
        let response = ensure_success(ENDPOINT, response).await?;

        let payload: AnalysisPayload = response
            .json()
            .await
            .map_err(|e| GatewayError::from_reqwest(ENDPOINT, e))?;
        payload
            .validate()
            .map_err(|reason| GatewayError::malformed(ENDPOINT, reason))?;
        debug!(
            "分析结果: {} 篇文献, {} 条引用边",
            payload.papers.len(),
            payload.edges.len()
        );
        Ok(payload)
    }
}
