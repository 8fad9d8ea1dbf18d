//! 并发受限的探测分发器
//!
//! 每个到期端点一个任务，由共享信号量限制同时进行的探测数量；
//! 分发器等待所有任务结束后才返回，保证相邻两轮不会重叠。

use crate::health::checker::EndpointProber;
use crate::health::recorder::OutcomeRecorder;
use crate::repository::Endpoint;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// 默认并发上限
pub const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 10;

/// 单个探测任务的结局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskResult {
    /// 已探测并写入记录
    Recorded,
    /// 已探测但写入失败
    RecordFailed,
    /// 等待并发许可时收到取消信号，未发出请求
    Cancelled,
}

/// 一次分发的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// 启动的任务数
    pub launched: usize,
    /// 实际发出探测的数量
    pub probed: usize,
    /// 成功写入的记录数
    pub recorded: usize,
    /// 写入失败的记录数
    pub record_failures: usize,
    /// 因关闭而未开始的任务数
    pub cancelled: usize,
    /// 异常退出（panic）的任务数
    pub panicked: usize,
}

/// 探测分发器
#[derive(Clone)]
pub struct Dispatcher {
    prober: Arc<dyn EndpointProber>,
    recorder: OutcomeRecorder,
    /// 进程内所有探测共享的并发许可
    semaphore: Arc<Semaphore>,
}

impl Dispatcher {
    /// 创建分发器
    ///
    /// # 参数
    /// * `prober` - 端点探测器
    /// * `recorder` - 结果记录器
    /// * `max_concurrent` - 并发上限，0 按 1 处理
    pub fn new(prober: Arc<dyn EndpointProber>, recorder: OutcomeRecorder, max_concurrent: usize) -> Self {
        Self {
            prober,
            recorder,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// 当前可用的并发许可数
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// 探测所有到期端点，全部完成后返回
    pub async fn dispatch(&self, due: Vec<Endpoint>, cancel: &CancellationToken) -> DispatchReport {
        let mut report = DispatchReport {
            launched: due.len(),
            ..DispatchReport::default()
        };

        if due.is_empty() {
            return report;
        }

        let handles: Vec<_> = due
            .into_iter()
            .map(|endpoint| {
                let prober = Arc::clone(&self.prober);
                let recorder = self.recorder.clone();
                let semaphore = Arc::clone(&self.semaphore);
                let cancel = cancel.clone();

                tokio::spawn(async move {
                    let _permit = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return TaskResult::Cancelled,
                        permit = semaphore.acquire_owned() => match permit {
                            Ok(permit) => permit,
                            Err(_) => return TaskResult::Cancelled,
                        },
                    };

                    debug!(endpoint_id = %endpoint.id, url = %endpoint.url, "开始探测端点");
                    let outcome = prober.probe(&endpoint, &cancel).await;

                    if recorder.record(&outcome).await {
                        TaskResult::Recorded
                    } else {
                        TaskResult::RecordFailed
                    }
                })
            })
            .collect();

        for joined in join_all(handles).await {
            match joined {
                Ok(TaskResult::Recorded) => {
                    report.probed += 1;
                    report.recorded += 1;
                }
                Ok(TaskResult::RecordFailed) => {
                    report.probed += 1;
                    report.record_failures += 1;
                }
                Ok(TaskResult::Cancelled) => report.cancelled += 1,
                Err(e) => {
                    error!("探测任务异常退出: {}", e);
                    report.panicked += 1;
                }
            }
        }

        report
    }
}
