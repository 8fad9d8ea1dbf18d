//! 存储仓库模块
//!
//! 后台工作器只通过这里定义的窄接口访问存储：
//! 读取活跃端点、查询最近一次探测时间、追加探测记录、清理过期记录。

pub mod memory;
pub mod sqlite;

use crate::error::RepositoryResult;
use crate::health::CheckOutcome;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;

/// 被监控的端点
///
/// 由外部CRUD层维护，工作器只读取活跃的端点，从不修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// 端点ID
    pub id: String,
    /// 探测URL
    pub url: String,
    /// 最小探测间隔（秒）
    pub interval_seconds: u64,
    /// 是否启用
    pub is_active: bool,
}

impl Endpoint {
    /// 创建新的活跃端点
    pub fn new(id: impl Into<String>, url: impl Into<String>, interval_seconds: u64) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            interval_seconds,
            is_active: true,
        }
    }

    /// 设置启用状态
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }
}

/// 监控端点仓库
#[async_trait]
pub trait MonitorRepository: Send + Sync {
    /// 列出所有活跃端点
    async fn list_active(&self) -> RepositoryResult<Vec<Endpoint>>;

    /// 查询端点最近一次探测记录的时间
    ///
    /// # 返回
    /// * `Ok(None)` - 该端点还没有任何记录
    ///
    /// 实现也可以用 `RepositoryError::NotFound` 表示没有记录，调用方两者等价处理。
    async fn last_checked_at(&self, endpoint_id: &str) -> RepositoryResult<Option<DateTime<Utc>>>;

    /// 追加一条探测记录
    async fn record_outcome(&self, outcome: &CheckOutcome) -> RepositoryResult<()>;
}

/// 可过期记录仓库（例如限时分享的代码片段）
#[async_trait]
pub trait ExpiringRecordRepository: Send + Sync {
    /// 删除所有过期时间早于 `now` 的记录，返回删除数量
    async fn delete_expired(&self, now: DateTime<Utc>) -> RepositoryResult<u64>;
}
