//! 到期判定
//!
//! 根据最近一次探测记录的时间判断端点本轮是否需要探测。
//! 端点的探测间隔只是最小间隔：不会比它更频繁，但可能因为轮次粒度而更晚。

use crate::repository::{Endpoint, MonitorRepository};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// 单个端点是否到期
///
/// * 没有任何历史记录 -> 到期
/// * `now - last >= interval` -> 到期
/// * 其他情况（包括记录时间晚于 `now` 的时钟回拨）-> 未到期
pub fn is_due(last_checked_at: Option<DateTime<Utc>>, interval_seconds: u64, now: DateTime<Utc>) -> bool {
    match last_checked_at {
        None => true,
        Some(last) => {
            let elapsed_ms = now.signed_duration_since(last).num_milliseconds();
            let interval_ms = i64::try_from(interval_seconds)
                .unwrap_or(i64::MAX)
                .saturating_mul(1000);
            elapsed_ms >= interval_ms
        }
    }
}

/// 一轮到期判定的结果
#[derive(Debug, Clone, Default)]
pub struct DuePartition {
    /// 本轮需要探测的端点
    pub due: Vec<Endpoint>,
    /// 未到期而跳过的端点ID
    pub not_due: Vec<String>,
    /// 查询最近记录失败而跳过的端点ID
    pub lookup_failures: Vec<String>,
}

impl DuePartition {
    /// 本轮跳过的端点总数
    pub fn skipped(&self) -> usize {
        self.not_due.len() + self.lookup_failures.len()
    }
}

/// 把活跃端点划分为到期/未到期
///
/// "没有记录"类的查询错误视为到期；其他查询错误只跳过该端点本轮，不影响其他端点。
pub async fn partition_due(
    repository: &dyn MonitorRepository,
    endpoints: Vec<Endpoint>,
    now: DateTime<Utc>,
) -> DuePartition {
    let mut partition = DuePartition::default();

    for endpoint in endpoints {
        let last_checked_at = match repository.last_checked_at(&endpoint.id).await {
            Ok(last) => last,
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                warn!(endpoint_id = %endpoint.id, error = %e, "查询最近探测记录失败，本轮跳过");
                partition.lookup_failures.push(endpoint.id);
                continue;
            }
        };

        if is_due(last_checked_at, endpoint.interval_seconds, now) {
            partition.due.push(endpoint);
        } else {
            debug!(endpoint_id = %endpoint.id, "未到探测间隔，跳过");
            partition.not_due.push(endpoint.id);
        }
    }

    partition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RepositoryError, RepositoryResult};
    use crate::health::CheckOutcome;
    use crate::repository::InMemoryRepository;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    #[test]
    fn test_never_checked_is_due() {
        assert!(is_due(None, 86_400, Utc::now()));
    }

    #[test]
    fn test_interval_boundary() {
        let now = Utc::now();
        let interval = 60;

        assert!(!is_due(Some(now - ChronoDuration::seconds(59)), interval, now));
        assert!(is_due(Some(now - ChronoDuration::seconds(60)), interval, now));
        assert!(is_due(Some(now - ChronoDuration::seconds(61)), interval, now));
    }

    #[test]
    fn test_zero_interval_always_due() {
        let now = Utc::now();
        assert!(is_due(Some(now), 0, now));
    }

    #[test]
    fn test_future_timestamp_is_not_due() {
        let now = Utc::now();
        assert!(!is_due(Some(now + ChronoDuration::minutes(5)), 60, now));
    }

    #[test]
    fn test_huge_interval_does_not_overflow() {
        let now = Utc::now();
        assert!(!is_due(Some(now - ChronoDuration::days(365)), u64::MAX, now));
    }

    #[tokio::test]
    async fn test_partition_mixed_endpoints() {
        let now = Utc::now();
        let repo = InMemoryRepository::new();
        repo.add_outcome(
            CheckOutcome::from_response("b", 200, Duration::ZERO)
                .with_checked_at(now - ChronoDuration::minutes(5)),
        )
        .await;
        repo.add_outcome(
            CheckOutcome::from_response("c", 200, Duration::ZERO)
                .with_checked_at(now - ChronoDuration::minutes(5)),
        )
        .await;
        repo.fail_lookup_for("d").await;

        let endpoints = vec![
            Endpoint::new("a", "http://a.test", 60),
            Endpoint::new("b", "http://b.test", 600),
            Endpoint::new("c", "http://c.test", 120),
            Endpoint::new("d", "http://d.test", 60),
        ];

        let partition = partition_due(&repo, endpoints, now).await;

        let due: Vec<_> = partition.due.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(due, vec!["a", "c"]);
        assert_eq!(partition.not_due, vec!["b".to_string()]);
        assert_eq!(partition.lookup_failures, vec!["d".to_string()]);
        assert_eq!(partition.skipped(), 2);
    }

    /// 用 `NotFound` 错误表示"没有记录"的仓库
    struct NotFoundRepository;

    #[async_trait]
    impl MonitorRepository for NotFoundRepository {
        async fn list_active(&self) -> RepositoryResult<Vec<Endpoint>> {
            Ok(Vec::new())
        }

        async fn last_checked_at(&self, _endpoint_id: &str) -> RepositoryResult<Option<DateTime<Utc>>> {
            Err(RepositoryError::NotFound)
        }

        async fn record_outcome(&self, _outcome: &CheckOutcome) -> RepositoryResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_not_found_error_counts_as_due() {
        let partition = partition_due(
            &NotFoundRepository,
            vec![Endpoint::new("a", "http://a.test", 3600)],
            Utc::now(),
        )
        .await;

        assert_eq!(partition.due.len(), 1);
        assert!(partition.lookup_failures.is_empty());
    }
}
