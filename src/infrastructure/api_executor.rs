//! API 执行器 - 基础设施层
//!
//! 持有唯一的 HTTP client，只暴露"发请求"的能力

use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::multipart::Form;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio_stream::wrappers::LinesStream;
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult};
use crate::infrastructure::notifier::{AppEvent, Notifier};

/// 逐行读取的响应流
pub type LineStream = BoxStream<'static, AppResult<String>>;

/// API 执行器
///
/// 职责：
/// - 持有唯一的 reqwest Client、后端地址和令牌
/// - 暴露 JSON / multipart / 流式请求能力
/// - 401 时发布 `AuthLogout` 事件
/// - 不认识 Paper / Question / 答卷
#[derive(Clone)]
pub struct ApiExecutor {
    client: Client,
    base_url: String,
    token: String,
    timeout: Duration,
    notifier: Notifier,
}

impl ApiExecutor {
    /// 创建新的 API 执行器
    ///
    /// 超时只作用于普通请求，进度流不设总超时。
    pub fn new(config: &Config, notifier: Notifier) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::api_request_failed("client", e))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
            notifier,
        })
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// 拼接完整地址
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if self.token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.token)
        }
    }

    /// GET 并解析 JSON
    pub async fn get_json(&self, path: &str) -> AppResult<JsonValue> {
        let request = self.client.get(self.url(path)).timeout(self.timeout);
        self.send_json(path, request).await
    }

    /// POST JSON 并解析 JSON
    pub async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> AppResult<JsonValue> {
        let request = self
            .client
            .post(self.url(path))
            .timeout(self.timeout)
            .json(body);
        self.send_json(path, request).await
    }

    /// POST multipart 表单并解析 JSON
    pub async fn post_multipart(&self, path: &str, form: Form) -> AppResult<JsonValue> {
        let request = self
            .client
            .post(self.url(path))
            .timeout(self.timeout)
            .multipart(form);
        self.send_json(path, request).await
    }

    /// POST 并以行流的方式读取响应体
    pub async fn open_line_stream(&self, path: &str, body: &JsonValue) -> AppResult<LineStream> {
        debug!("打开进度流: {}", path);
        let request = self
            .client
            .post(self.url(path))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(body);
        let response = self.send(path, request).await?;

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));
        let reader = BufReader::new(StreamReader::new(bytes));
        let endpoint = path.to_string();

        let lines = LinesStream::new(reader.lines())
            .map(move |line| line.map_err(|e| AppError::stream_read_failed(endpoint.clone(), e.to_string())));
        Ok(lines.boxed())
    }

    async fn send_json(&self, path: &str, request: RequestBuilder) -> AppResult<JsonValue> {
        let response = self.send(path, request).await?;
        let text = response
            .text()
            .await
            .map_err(|e| AppError::api_request_failed(path, e))?;
        if text.trim().is_empty() {
            return Ok(JsonValue::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> AppResult<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(path, e))?;
        self.check_status(path, response).await
    }

    async fn check_status(&self, path: &str, response: Response) -> AppResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            warn!("⚠️ 登录已失效: {}", path);
            self.notifier.publish(AppEvent::AuthLogout {
                reason: format!("{} 返回 401", path),
            });
            return Err(ApiError::Unauthorized {
                endpoint: path.to_string(),
            }
            .into());
        }

        let message = response.text().await.ok().filter(|t| !t.is_empty());
        warn!("API 返回错误 {} ({}): {:?}", status, path, message);
        Err(ApiError::BadResponse {
            endpoint: path.to_string(),
            status: status.as_u16(),
            message,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let config = Config {
            api_base_url: "http://backend:8000/".to_string(),
            ..Default::default()
        };
        let executor = ApiExecutor::new(&config, Notifier::new()).unwrap();
        assert_eq!(
            executor.url("/api/evaluation/sessions/s1/results"),
            "http://backend:8000/api/evaluation/sessions/s1/results"
        );
        assert_eq!(executor.url("health"), "http://backend:8000/health");
    }
}
