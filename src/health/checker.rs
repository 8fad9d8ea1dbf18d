//! HTTP端点探测器实现
//!
//! 对单个端点发出一次有时限的GET请求，并把结果归类为一条探测记录

use crate::error::{ProbeError, Result};
use crate::health::result::CheckOutcome;
use crate::repository::Endpoint;
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// 默认请求超时时间
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// 端点探测器trait
///
/// 每次调用恰好返回一条结果，探测失败也以异常结果表示，内部不重试。
#[async_trait]
pub trait EndpointProber: Send + Sync {
    /// 探测单个端点
    ///
    /// # 参数
    /// * `endpoint` - 被探测的端点
    /// * `cancel` - 进程级取消信号，触发时应尽快中止正在进行的请求
    ///
    /// # 返回
    /// * `CheckOutcome` - 探测结果
    async fn probe(&self, endpoint: &Endpoint, cancel: &CancellationToken) -> CheckOutcome;
}

/// HTTP探测器
pub struct HttpProber {
    /// HTTP客户端
    client: Client,
    /// 总超时时间
    timeout: Duration,
}

impl HttpProber {
    /// 创建新的HTTP探测器
    ///
    /// # 参数
    /// * `timeout` - 单次请求的总超时时间（连接、TLS、读取响应头）
    /// * `user_agent` - 标识本探测器的 User-Agent
    ///
    /// # 返回
    /// * `Result<Self>` - 探测器实例
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        if timeout.is_zero() {
            return Err(ProbeError::InvalidSettings("请求超时时间不能为0".to_string()).into());
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(ProbeError::ClientBuild)?;

        Ok(Self { client, timeout })
    }

    /// 格式化请求错误信息，使其更加清晰易读
    fn format_request_error(&self, error: &reqwest::Error) -> String {
        if error.is_timeout() {
            format!("Request timeout after {}ms", self.timeout.as_millis())
        } else if error.is_builder() {
            format!("Invalid request: {error}")
        } else if error.is_connect() {
            format!("Connection failed: {}", root_cause(error))
        } else {
            format!("Request failed: {}", root_cause(error))
        }
    }
}

#[async_trait]
impl EndpointProber for HttpProber {
    async fn probe(&self, endpoint: &Endpoint, cancel: &CancellationToken) -> CheckOutcome {
        let start_time = Instant::now();

        let request = self.client.get(&endpoint.url);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return CheckOutcome::from_failure(
                    endpoint.id.clone(),
                    "Request cancelled: worker shutting down",
                    start_time.elapsed(),
                );
            }
            response = request.send() => response,
        };

        let elapsed = start_time.elapsed();

        match response {
            Ok(response) => {
                CheckOutcome::from_response(endpoint.id.clone(), response.status().as_u16(), elapsed)
            }
            Err(e) => {
                CheckOutcome::from_failure(endpoint.id.clone(), self.format_request_error(&e), elapsed)
            }
        }
    }
}

/// 默认的 User-Agent，例如 `uptime-vitals/0.1.0`
pub fn default_user_agent() -> String {
    format!("{}/{}", crate::APP_NAME, crate::VERSION)
}

/// reqwest 的顶层错误信息往往只有 "error sending request"，沿错误链取最底层的描述
fn root_cause(error: &reqwest::Error) -> String {
    let mut source: &dyn std::error::Error = error;
    while let Some(next) = source.source() {
        source = next;
    }
    source.to_string()
}
