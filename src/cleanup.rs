//! 过期记录清理
//!
//! 与健康探测完全独立的第二个定时循环，只共享取消信号。

use crate::error::RepositoryResult;
use crate::repository::ExpiringRecordRepository;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// 默认清理间隔
pub const DEFAULT_EXPIRY_INTERVAL: Duration = Duration::from_secs(3600);

/// 过期记录清理轮次
#[derive(Clone)]
pub struct ExpirySweep {
    repository: Arc<dyn ExpiringRecordRepository>,
    period: Duration,
}

impl ExpirySweep {
    pub fn new(repository: Arc<dyn ExpiringRecordRepository>, period: Duration) -> Self {
        Self { repository, period }
    }

    /// 删除所有在 `now` 之前过期的记录
    ///
    /// 删除操作是幂等的，失败时由下一个节拍自然重试。
    pub async fn run_once(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        let deleted = self.repository.delete_expired(now).await?;
        if deleted > 0 {
            info!("已清理 {} 条过期记录", deleted);
        } else {
            debug!("没有过期记录");
        }
        Ok(deleted)
    }

    /// 清理循环，第一次清理发生在启动一个间隔之后
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(period_secs = self.period.as_secs(), "过期记录清理循环已启动");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once(Utc::now()).await {
                        error!("清理过期记录失败: {}", e);
                    }
                }
            }
        }

        info!("过期记录清理循环已停止");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn test_run_once_is_idempotent() {
        let repo = Arc::new(InMemoryRepository::new());
        let now = Utc::now();
        repo.insert_expiring("s-1", now - ChronoDuration::hours(3)).await;
        repo.insert_expiring("s-2", now - ChronoDuration::seconds(1)).await;
        repo.insert_expiring("s-3", now + ChronoDuration::days(1)).await;

        let sweep = ExpirySweep::new(repo.clone(), DEFAULT_EXPIRY_INTERVAL);
        assert_eq!(sweep.run_once(now).await.unwrap(), 2);
        assert_eq!(sweep.run_once(now).await.unwrap(), 0);
        assert_eq!(repo.expiring_count().await, 1);
    }

    #[tokio::test]
    async fn test_run_once_propagates_failure() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.fail_delete_expired(true);

        let sweep = ExpirySweep::new(repo, DEFAULT_EXPIRY_INTERVAL);
        assert!(sweep.run_once(Utc::now()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_waits_one_period_and_survives_failures() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.insert_expiring("s-1", Utc::now() - ChronoDuration::hours(1)).await;
        repo.fail_delete_expired(true);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            ExpirySweep::new(repo.clone(), Duration::from_secs(3600)).run(cancel.clone()),
        );

        // 启动时不清理
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(repo.expiring_count().await, 1);

        // 第一次节拍失败，循环继续
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(repo.expiring_count().await, 1);

        // 下一次节拍重试成功
        repo.fail_delete_expired(false);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(repo.expiring_count().await, 0);

        cancel.cancel();
        handle.await.unwrap();
    }
}
