//! 健康探测模块
//!
//! 提供端点探测、到期判定、受限并发分发、结果记录和轮次调度功能

pub mod checker;
pub mod dispatcher;
pub mod due;
pub mod recorder;
pub mod result;
pub mod scheduler;

// 重新导出主要类型
pub use checker::{EndpointProber, HttpProber};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use due::{is_due, partition_due, DuePartition};
pub use recorder::OutcomeRecorder;
pub use result::{CheckOutcome, HealthStatus};
pub use scheduler::{HealthSweep, SweepReport};
