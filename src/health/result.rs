//! 探测结果数据结构
//!
//! 定义单次探测产生的不可变结果记录和状态枚举

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// 健康状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// 服务正常
    Up,
    /// 服务异常
    Down,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Up => write!(f, "正常"),
            HealthStatus::Down => write!(f, "异常"),
        }
    }
}

impl HealthStatus {
    /// 判断状态是否为健康
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Up)
    }

    /// 存储层使用的状态字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Up => "up",
            HealthStatus::Down => "down",
        }
    }
}

impl FromStr for HealthStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(HealthStatus::Up),
            "down" => Ok(HealthStatus::Down),
            other => Err(format!("未知的健康状态: {other}")),
        }
    }
}

/// 单次探测的结果记录
///
/// 每次实际发出的探测恰好产生一条记录，写入后不再修改。
/// 没有HTTP响应时 `status_code` 为 0，没有错误时 `error_message` 为空字符串。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    /// 记录ID
    pub id: Uuid,
    /// 被探测的端点ID
    pub endpoint_id: String,
    /// 健康状态
    pub status: HealthStatus,
    /// HTTP状态码，无响应时为0
    pub status_code: u16,
    /// 端到端响应时间（毫秒）
    pub response_time_ms: u64,
    /// 错误信息，无错误时为空
    #[serde(default)]
    pub error_message: String,
    /// 探测完成时间
    pub checked_at: DateTime<Utc>,
}

impl CheckOutcome {
    /// 收到HTTP响应时的结果
    ///
    /// 状态码 >= 400 视为异常，但不携带错误信息。
    pub fn from_response(endpoint_id: impl Into<String>, status_code: u16, elapsed: Duration) -> Self {
        let status = if status_code >= 400 {
            HealthStatus::Down
        } else {
            HealthStatus::Up
        };

        Self {
            id: Uuid::new_v4(),
            endpoint_id: endpoint_id.into(),
            status,
            status_code,
            response_time_ms: duration_to_ms(elapsed),
            error_message: String::new(),
            checked_at: Utc::now(),
        }
    }

    /// 请求构建或传输失败时的结果
    pub fn from_failure(
        endpoint_id: impl Into<String>,
        error_message: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint_id: endpoint_id.into(),
            status: HealthStatus::Down,
            status_code: 0,
            response_time_ms: duration_to_ms(elapsed),
            error_message: error_message.into(),
            checked_at: Utc::now(),
        }
    }

    /// 设置探测时间
    pub fn with_checked_at(mut self, checked_at: DateTime<Utc>) -> Self {
        self.checked_at = checked_at;
        self
    }

    /// 是否有错误信息
    pub fn has_error(&self) -> bool {
        !self.error_message.is_empty()
    }
}

fn duration_to_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
