//! 内存仓库实现
//!
//! 同时实现 [`MonitorRepository`] 和 [`ExpiringRecordRepository`]，
//! 用于测试和嵌入式场景，并支持注入各类存储故障。

use super::{Endpoint, ExpiringRecordRepository, MonitorRepository};
use crate::error::{RepositoryError, RepositoryResult};
use crate::health::CheckOutcome;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// 故障注入开关
#[derive(Debug, Default)]
struct FaultInjection {
    list_active: AtomicBool,
    delete_expired: AtomicBool,
    lookup: RwLock<HashSet<String>>,
    record: RwLock<HashSet<String>>,
}

/// 内存仓库
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    /// 端点列表（包含未启用的）
    endpoints: RwLock<Vec<Endpoint>>,
    /// 探测记录日志，按写入顺序追加
    outcomes: RwLock<Vec<CheckOutcome>>,
    /// 可过期记录: ID -> 过期时间
    expiring: RwLock<HashMap<String, DateTime<Utc>>>,
    faults: FaultInjection,
}

impl InMemoryRepository {
    /// 创建空仓库
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用给定端点创建仓库
    pub fn with_endpoints(endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints: RwLock::new(endpoints),
            ..Self::default()
        }
    }

    /// 预置一条历史探测记录
    pub async fn add_outcome(&self, outcome: CheckOutcome) {
        self.outcomes.write().await.push(outcome);
    }

    /// 所有探测记录的快照
    pub async fn outcomes(&self) -> Vec<CheckOutcome> {
        self.outcomes.read().await.clone()
    }

    /// 指定端点的探测记录
    pub async fn outcomes_for(&self, endpoint_id: &str) -> Vec<CheckOutcome> {
        self.outcomes
            .read()
            .await
            .iter()
            .filter(|o| o.endpoint_id == endpoint_id)
            .cloned()
            .collect()
    }

    /// 添加一条可过期记录
    pub async fn insert_expiring(&self, id: impl Into<String>, expires_at: DateTime<Utc>) {
        self.expiring.write().await.insert(id.into(), expires_at);
    }

    /// 剩余可过期记录数量
    pub async fn expiring_count(&self) -> usize {
        self.expiring.read().await.len()
    }

    /// 让 `list_active` 失败
    pub fn fail_list_active(&self, fail: bool) {
        self.faults.list_active.store(fail, Ordering::SeqCst);
    }

    /// 让 `delete_expired` 失败
    pub fn fail_delete_expired(&self, fail: bool) {
        self.faults.delete_expired.store(fail, Ordering::SeqCst);
    }

    /// 让指定端点的 `last_checked_at` 查询失败
    pub async fn fail_lookup_for(&self, endpoint_id: impl Into<String>) {
        self.faults.lookup.write().await.insert(endpoint_id.into());
    }

    /// 让指定端点的 `record_outcome` 写入失败
    pub async fn fail_record_for(&self, endpoint_id: impl Into<String>) {
        self.faults.record.write().await.insert(endpoint_id.into());
    }

    /// 恢复指定端点的 `record_outcome` 写入
    pub async fn recover_record_for(&self, endpoint_id: &str) {
        self.faults.record.write().await.remove(endpoint_id);
    }
}

#[async_trait]
impl MonitorRepository for InMemoryRepository {
    async fn list_active(&self) -> RepositoryResult<Vec<Endpoint>> {
        if self.faults.list_active.load(Ordering::SeqCst) {
            return Err(RepositoryError::Backend("无法读取端点列表".to_string()));
        }

        Ok(self
            .endpoints
            .read()
            .await
            .iter()
            .filter(|e| e.is_active)
            .cloned()
            .collect())
    }

    async fn last_checked_at(&self, endpoint_id: &str) -> RepositoryResult<Option<DateTime<Utc>>> {
        if self.faults.lookup.read().await.contains(endpoint_id) {
            return Err(RepositoryError::Backend(format!(
                "无法读取端点 {endpoint_id} 的探测记录"
            )));
        }

        Ok(self
            .outcomes
            .read()
            .await
            .iter()
            .filter(|o| o.endpoint_id == endpoint_id)
            .map(|o| o.checked_at)
            .max())
    }

    async fn record_outcome(&self, outcome: &CheckOutcome) -> RepositoryResult<()> {
        if self.faults.record.read().await.contains(&outcome.endpoint_id) {
            return Err(RepositoryError::Backend(format!(
                "无法写入端点 {} 的探测记录",
                outcome.endpoint_id
            )));
        }

        self.outcomes.write().await.push(outcome.clone());
        Ok(())
    }
}

#[async_trait]
impl ExpiringRecordRepository for InMemoryRepository {
    async fn delete_expired(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        if self.faults.delete_expired.load(Ordering::SeqCst) {
            return Err(RepositoryError::Backend("无法清理过期记录".to_string()));
        }

        let mut expiring = self.expiring.write().await;
        let before = expiring.len();
        expiring.retain(|_, expires_at| *expires_at >= now);
        Ok((before - expiring.len()) as u64)
    }
}
