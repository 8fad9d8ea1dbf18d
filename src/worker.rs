//! 后台工作器生命周期
//!
//! 启动健康探测和过期清理两个循环；停止时发出取消信号并等待两个循环全部退出。
//! 所有依赖都在构造时注入，没有全局状态。

use crate::cleanup::{ExpirySweep, DEFAULT_EXPIRY_INTERVAL};
use crate::error::{RepositoryResult, Result};
use crate::health::checker::{default_user_agent, EndpointProber, HttpProber, DEFAULT_REQUEST_TIMEOUT};
use crate::health::dispatcher::DEFAULT_MAX_CONCURRENT_CHECKS;
use crate::health::scheduler::{HealthSweep, SweepReport, DEFAULT_SWEEP_INTERVAL};
use crate::repository::{ExpiringRecordRepository, MonitorRepository};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 工作器运行参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    /// 健康探测轮次间隔
    pub sweep_interval: Duration,
    /// 过期清理间隔
    pub expiry_interval: Duration,
    /// 单次探测请求超时
    pub request_timeout: Duration,
    /// 并发探测上限
    pub max_concurrent_checks: usize,
    /// 探测请求的 User-Agent
    pub user_agent: String,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            expiry_interval: DEFAULT_EXPIRY_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_concurrent_checks: DEFAULT_MAX_CONCURRENT_CHECKS,
            user_agent: default_user_agent(),
        }
    }
}

/// 工作器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// 已创建，尚未启动
    Idle,
    /// 两个循环正在运行
    Running,
    /// 已发出取消信号，等待循环退出
    Stopping,
    /// 两个循环均已退出
    Stopped,
}

/// 后台监控工作器
pub struct MonitorWorker {
    health: HealthSweep,
    expiry: ExpirySweep,
    state: WorkerState,
    cancel: Option<CancellationToken>,
    tasks: Vec<JoinHandle<()>>,
}

impl MonitorWorker {
    /// 创建工作器
    ///
    /// # 参数
    /// * `monitors` - 端点与探测记录仓库
    /// * `expiring` - 可过期记录仓库
    /// * `prober` - 端点探测器
    /// * `settings` - 运行参数
    pub fn new(
        monitors: Arc<dyn MonitorRepository>,
        expiring: Arc<dyn ExpiringRecordRepository>,
        prober: Arc<dyn EndpointProber>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            health: HealthSweep::new(
                monitors,
                prober,
                settings.max_concurrent_checks,
                settings.sweep_interval,
            ),
            expiry: ExpirySweep::new(expiring, settings.expiry_interval),
            state: WorkerState::Idle,
            cancel: None,
            tasks: Vec::new(),
        }
    }

    /// 使用HTTP探测器创建工作器
    pub fn with_http_prober(
        monitors: Arc<dyn MonitorRepository>,
        expiring: Arc<dyn ExpiringRecordRepository>,
        settings: WorkerSettings,
    ) -> Result<Self> {
        let prober = HttpProber::new(settings.request_timeout, &settings.user_agent)?;
        Ok(Self::new(monitors, expiring, Arc::new(prober), settings))
    }

    /// 当前状态
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// 启动两个循环，立即返回
    ///
    /// 必须在 tokio 运行时内调用。只有处于 `Idle` 状态时生效。
    pub fn start(&mut self) {
        if self.state != WorkerState::Idle {
            warn!("工作器当前状态为 {:?}，忽略启动请求", self.state);
            return;
        }

        let cancel = CancellationToken::new();

        self.tasks.push(tokio::spawn(self.health.clone().run(cancel.clone())));
        self.tasks.push(tokio::spawn(self.expiry.clone().run(cancel.clone())));

        self.cancel = Some(cancel);
        self.state = WorkerState::Running;
        info!("监控工作器已启动");
    }

    /// 发出取消信号并等待两个循环退出
    ///
    /// 最长耗时受在途探测的请求超时约束。非运行状态下调用不做任何事。
    pub async fn stop(&mut self) {
        if self.state != WorkerState::Running {
            debug!("工作器当前状态为 {:?}，忽略停止请求", self.state);
            return;
        }

        self.state = WorkerState::Stopping;
        info!("正在停止监控工作器...");

        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                error!("工作器循环异常退出: {}", e);
            }
        }

        self.state = WorkerState::Stopped;
        info!("监控工作器已停止");
    }

    /// 立即执行一轮健康探测（不依赖循环）
    pub async fn sweep_once(&self) -> SweepReport {
        self.health.run_sweep(&CancellationToken::new()).await
    }

    /// 立即执行一次过期清理（不依赖循环）
    pub async fn purge_once(&self) -> RepositoryResult<u64> {
        self.expiry.run_once(Utc::now()).await
    }
}

impl Drop for MonitorWorker {
    fn drop(&mut self) {
        // 未调用 stop 就被销毁时，至少让循环尽快退出
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::CheckOutcome;
    use crate::repository::{Endpoint, InMemoryRepository};
    use async_trait::async_trait;

    struct OkProber;

    #[async_trait]
    impl EndpointProber for OkProber {
        async fn probe(&self, endpoint: &Endpoint, _cancel: &CancellationToken) -> CheckOutcome {
            CheckOutcome::from_response(endpoint.id.clone(), 200, Duration::ZERO)
        }
    }

    fn worker(repo: Arc<InMemoryRepository>) -> MonitorWorker {
        MonitorWorker::new(repo.clone(), repo, Arc::new(OkProber), WorkerSettings::default())
    }

    #[test]
    fn test_default_settings() {
        let settings = WorkerSettings::default();
        assert_eq!(settings.sweep_interval, Duration::from_secs(60));
        assert_eq!(settings.expiry_interval, Duration::from_secs(3600));
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
        assert_eq!(settings.max_concurrent_checks, 10);
        assert!(settings.user_agent.starts_with("uptime-vitals/"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_transitions() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut worker = worker(repo);
        assert_eq!(worker.state(), WorkerState::Idle);

        worker.start();
        assert_eq!(worker.state(), WorkerState::Running);

        worker.stop().await;
        assert_eq!(worker.state(), WorkerState::Stopped);

        // 停止后再启动和再停止都不生效
        worker.start();
        assert_eq!(worker.state(), WorkerState::Stopped);
        worker.stop().await;
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_before_start_is_noop() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut worker = worker(repo);
        worker.stop().await;
        assert_eq!(worker.state(), WorkerState::Idle);
    }

    #[tokio::test]
    async fn test_with_http_prober_rejects_zero_timeout() {
        let repo = Arc::new(InMemoryRepository::new());
        let settings = WorkerSettings {
            request_timeout: Duration::ZERO,
            ..WorkerSettings::default()
        };
        assert!(MonitorWorker::with_http_prober(repo.clone(), repo, settings).is_err());
    }

    #[tokio::test]
    async fn test_one_shot_operations() {
        let repo = Arc::new(InMemoryRepository::with_endpoints(vec![Endpoint::new(
            "a",
            "http://a.test",
            60,
        )]));
        repo.insert_expiring("s-1", Utc::now() - chrono::Duration::minutes(1))
            .await;
        let worker = worker(repo.clone());

        let report = worker.sweep_once().await;
        assert_eq!(report.dispatch.recorded, 1);
        assert_eq!(worker.purge_once().await.unwrap(), 1);
        assert_eq!(worker.state(), WorkerState::Idle);
    }
}
