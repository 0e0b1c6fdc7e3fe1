//! 外部服务 HTTP 客户端
//!
//! 每个客户端实现 `services::gateway` 中的一个 trait

pub mod search_client;
pub mod semantic_client;
pub mod summarize_client;

use std::time::Duration;

use reqwest::{Client, Response};

use crate::error::{GatewayError, GatewayResult};

pub use search_client::SearchClient;
pub use semantic_client::SemanticClient;
pub use summarize_client::SummarizeClient;

/// 构建带超时的 HTTP 客户端
pub(crate) fn build_http_client(timeout: Duration) -> GatewayResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| GatewayError::unavailable("http-client", e))
}

/// 非 2xx 响应转换为 `Rejected`，附带响应正文
pub(crate) async fn ensure_success(endpoint: &str, response: Response) -> GatewayResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.ok().filter(|b| !b.trim().is_empty());
    Err(GatewayError::rejected(endpoint, Some(status.as_u16()), body))
}
