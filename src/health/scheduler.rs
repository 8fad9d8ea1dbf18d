//! 健康探测轮次调度
//!
//! 固定节拍触发一轮完整探测：读取活跃端点 -> 到期判定 -> 受限并发分发。
//! 节拍与端点自身的探测间隔无关，后者只决定某一轮中哪些端点需要探测。

use crate::health::checker::EndpointProber;
use crate::health::dispatcher::{DispatchReport, Dispatcher};
use crate::health::due::partition_due;
use crate::health::recorder::OutcomeRecorder;
use crate::repository::MonitorRepository;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// 默认轮次间隔
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// 单轮探测的统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// 读取端点列表失败，本轮中止
    pub aborted: bool,
    /// 活跃端点数
    pub active: usize,
    /// 到期端点数
    pub due: usize,
    /// 未到期跳过的端点数
    pub not_due: usize,
    /// 查询最近记录失败而跳过的端点数
    pub lookup_failures: usize,
    /// 分发统计
    pub dispatch: DispatchReport,
}

/// 健康探测轮次
#[derive(Clone)]
pub struct HealthSweep {
    repository: Arc<dyn MonitorRepository>,
    dispatcher: Dispatcher,
    period: Duration,
}

impl HealthSweep {
    /// 创建健康探测轮次
    ///
    /// # 参数
    /// * `repository` - 端点仓库
    /// * `prober` - 端点探测器
    /// * `max_concurrent` - 并发上限
    /// * `period` - 轮次间隔
    pub fn new(
        repository: Arc<dyn MonitorRepository>,
        prober: Arc<dyn EndpointProber>,
        max_concurrent: usize,
        period: Duration,
    ) -> Self {
        let recorder = OutcomeRecorder::new(Arc::clone(&repository));
        Self {
            repository,
            dispatcher: Dispatcher::new(prober, recorder, max_concurrent),
            period,
        }
    }

    /// 执行一轮完整探测，所有探测结束后返回
    pub async fn run_sweep(&self, cancel: &CancellationToken) -> SweepReport {
        let endpoints = match self.repository.list_active().await {
            Ok(endpoints) => endpoints,
            Err(e) => {
                error!("读取活跃端点失败，本轮中止: {}", e);
                return SweepReport {
                    aborted: true,
                    ..SweepReport::default()
                };
            }
        };

        let mut report = SweepReport {
            active: endpoints.len(),
            ..SweepReport::default()
        };

        if endpoints.is_empty() {
            debug!("没有活跃端点");
            return report;
        }

        let partition = partition_due(self.repository.as_ref(), endpoints, Utc::now()).await;
        report.due = partition.due.len();
        report.not_due = partition.not_due.len();
        report.lookup_failures = partition.lookup_failures.len();

        info!(
            active = report.active,
            due = report.due,
            skipped = partition.skipped(),
            "开始探测 {} 个端点",
            report.due
        );

        report.dispatch = self.dispatcher.dispatch(partition.due, cancel).await;

        debug!(
            recorded = report.dispatch.recorded,
            record_failures = report.dispatch.record_failures,
            cancelled = report.dispatch.cancelled,
            "本轮探测完成"
        );

        report
    }

    /// 轮次循环：启动时立即执行一轮，之后按固定间隔执行
    ///
    /// 只在两轮之间检查取消信号；进行中的一轮会把当前分发跑完
    /// （在途请求本身会被取消信号中止）。超时的节拍不排队。
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(period_secs = self.period.as_secs(), "健康探测循环已启动");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_sweep(&cancel).await;
                }
            }
        }

        info!("健康探测循环已停止");
    }
}
