//! Uptime Vitals - 后台端点可用性监控工作器
//!
//! 这是一个用Rust编写的后台工作器，支持：
//! - 按端点各自的最小间隔进行HTTP可用性探测
//! - 全局并发上限与轮次屏障
//! - 每次探测结果的持久化记录
//! - 独立的过期记录清理循环
//! - 基于取消信号的优雅停止

pub mod cleanup;
pub mod cli;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod repository;
pub mod signal;
pub mod worker;

// 重新导出主要类型
pub use config::{Config, WorkerConfig};
pub use error::UptimeVitalsError;
pub use health::{CheckOutcome, EndpointProber, HealthStatus, HttpProber};
pub use repository::{Endpoint, ExpiringRecordRepository, MonitorRepository};
pub use worker::{MonitorWorker, WorkerSettings, WorkerState};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
