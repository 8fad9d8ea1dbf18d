//! 探测结果记录器

use crate::health::CheckOutcome;
use crate::repository::MonitorRepository;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// 把探测结果追加写入仓库
///
/// 写入失败只记录日志，不重试也不向上传播：该端点下一轮仍会被判定为到期。
#[derive(Clone)]
pub struct OutcomeRecorder {
    repository: Arc<dyn MonitorRepository>,
}

impl OutcomeRecorder {
    pub fn new(repository: Arc<dyn MonitorRepository>) -> Self {
        Self { repository }
    }

    /// 写入一条探测结果，返回是否成功
    pub async fn record(&self, outcome: &CheckOutcome) -> bool {
        if let Err(e) = self.repository.record_outcome(outcome).await {
            error!(
                endpoint_id = %outcome.endpoint_id,
                error = %e,
                "写入探测记录失败"
            );
            return false;
        }

        if outcome.status.is_healthy() {
            debug!(
                endpoint_id = %outcome.endpoint_id,
                status_code = outcome.status_code,
                response_time_ms = outcome.response_time_ms,
                "端点探测正常"
            );
        } else {
            warn!(
                endpoint_id = %outcome.endpoint_id,
                status_code = outcome.status_code,
                response_time_ms = outcome.response_time_ms,
                error = %outcome.error_message,
                "端点探测异常"
            );
        }

        true
    }
}
