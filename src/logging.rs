//! 日志系统模块
//!
//! 提供结构化日志配置和管理功能。`log` 宏通过 LogTracer 桥接到 tracing。

use crate::config::LoggingConfig;
use crate::health::SweepReport;
use log::LevelFilter;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, OnceLock};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter, Layer};

/// 全局日志状态
#[derive(Debug, Default)]
struct GlobalLoggingState {
    /// 是否已经初始化
    initialized: bool,
    /// 初始化结果
    init_result: Option<String>,
    /// 当前配置
    current_config: Option<LogConfig>,
}

/// 全局日志状态管理器
static GLOBAL_LOGGING_STATE: OnceLock<Mutex<GlobalLoggingState>> = OnceLock::new();

fn global_state() -> MutexGuard<'static, GlobalLoggingState> {
    GLOBAL_LOGGING_STATE
        .get_or_init(|| Mutex::new(GlobalLoggingState::default()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 日志配置结构
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// 日志级别
    pub level: LevelFilter,
    /// 日志文件路径（可选）
    pub file_path: Option<PathBuf>,
    /// 是否使用JSON格式
    pub json_format: bool,
    /// 模块级别日志控制
    pub module_levels: HashMap<String, LevelFilter>,
}

impl Default for LogConfig {
    fn default() -> Self {
        let mut module_levels = HashMap::new();
        // sqlx 每条语句都会打一条 info 日志
        module_levels.insert("sqlx".to_string(), LevelFilter::Warn);

        Self {
            level: LevelFilter::Info,
            file_path: None,
            json_format: false,
            module_levels,
        }
    }
}

impl LogConfig {
    /// 从配置文件的日志段构建，无法识别的级别回退到 info
    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut log_config = Self {
            level: parse_level(&config.level),
            file_path: config.file_path.clone(),
            json_format: config.json_format,
            ..Self::default()
        };

        for (module, level) in &config.module_levels {
            log_config
                .module_levels
                .insert(module.clone(), parse_level(level));
        }

        log_config
    }
}

fn parse_level(level: &str) -> LevelFilter {
    LevelFilter::from_str(level).unwrap_or(LevelFilter::Info)
}

/// 日志系统
#[derive(Debug, Clone)]
pub struct LoggingSystem {
    config: LogConfig,
}

impl LoggingSystem {
    /// 初始化日志系统
    ///
    /// 进程内只会真正初始化一次，之后的调用直接返回新的句柄。
    pub fn setup_logging(config: LogConfig) -> anyhow::Result<Self> {
        Self::setup_logging_with_options(config, false)
    }

    /// 初始化日志系统（带选项）
    ///
    /// # 参数
    /// * `config` - 日志配置
    /// * `force_reinit` - 是否强制重新初始化（主要用于测试）
    pub fn setup_logging_with_options(
        config: LogConfig,
        force_reinit: bool,
    ) -> anyhow::Result<Self> {
        {
            let state = global_state();
            if state.initialized && !force_reinit {
                if let Some(e) = &state.init_result {
                    return Err(anyhow::anyhow!("日志系统之前初始化失败: {}", e));
                }
                return Ok(Self { config });
            }
        }

        let init_result = Self::perform_initialization(&config);

        {
            let mut state = global_state();
            state.initialized = true;
            state.current_config = Some(config.clone());
            state.init_result = init_result.as_ref().err().map(|e| e.to_string());
        }

        init_result?;
        Ok(Self { config })
    }

    fn perform_initialization(config: &LogConfig) -> anyhow::Result<()> {
        Self::init_log_tracer()?;
        Self::init_tracing_subscriber(config)
    }

    /// 初始化 LogTracer（log crate 到 tracing 的桥接）
    fn init_log_tracer() -> anyhow::Result<()> {
        use tracing_log::LogTracer;

        static LOG_TRACER_INIT: OnceLock<Result<(), String>> = OnceLock::new();

        let result = LOG_TRACER_INIT.get_or_init(|| LogTracer::init().map_err(|e| e.to_string()));

        result
            .as_ref()
            .map_err(|e| anyhow::anyhow!("LogTracer初始化失败: {}", e))?;
        Ok(())
    }

    /// 构建过滤器：`RUST_LOG` 优先，其次是配置中的全局和模块级别
    fn build_env_filter(config: &LogConfig) -> anyhow::Result<EnvFilter> {
        let mut env_filter =
            EnvFilter::from_default_env().add_directive(level_to_string(config.level).parse()?);

        for (module, level) in &config.module_levels {
            let directive = format!("{}={}", module, level_to_string(*level))
                .parse()
                .map_err(|e| anyhow::anyhow!("无效的模块日志级别 {}: {}", module, e))?;
            env_filter = env_filter.add_directive(directive);
        }

        Ok(env_filter)
    }

    fn init_tracing_subscriber(config: &LogConfig) -> anyhow::Result<()> {
        let env_filter = Self::build_env_filter(config)?;

        let fmt_layer = match &config.file_path {
            Some(file_path) => {
                if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| anyhow::anyhow!("创建日志目录失败: {}", e))?;
                }
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(file_path)
                    .map_err(|e| anyhow::anyhow!("创建日志文件失败: {}", e))?;

                let layer = fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_timer(fmt::time::ChronoUtc::rfc_3339());
                if config.json_format {
                    layer.json().boxed()
                } else {
                    layer.with_target(true).boxed()
                }
            }
            None if config.json_format => fmt::layer()
                .json()
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_file(true)
                .with_line_number(true)
                .boxed(),
            None => fmt::layer()
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_ansi(true)
                .with_thread_names(true)
                .boxed(),
        };

        match registry().with(env_filter).with(fmt_layer).try_init() {
            Ok(()) => {
                tracing::info!("日志系统初始化完成");
                tracing::debug!("日志配置: {:?}", config);
                Ok(())
            }
            Err(e) => {
                let error_msg = e.to_string();
                if error_msg.contains("already been set")
                    || error_msg.contains("already initialized")
                {
                    // 测试进程里可能已有其他订阅者
                    tracing::debug!("日志系统已经初始化过了");
                    Ok(())
                } else {
                    Err(anyhow::anyhow!("tracing subscriber初始化失败: {}", error_msg))
                }
            }
        }
    }

    /// 当前句柄使用的配置
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// 检查日志系统是否已初始化
    pub fn is_initialized() -> bool {
        global_state().initialized
    }

    /// 获取当前日志配置（如果已初始化）
    pub fn current_config() -> Option<LogConfig> {
        global_state().current_config.clone()
    }

    /// 重置日志系统状态（主要用于测试）
    #[cfg(test)]
    pub fn reset_for_testing() {
        let mut state = global_state();
        state.initialized = false;
        state.init_result = None;
        state.current_config = None;
    }

    /// 记录一轮探测的汇总
    pub fn sweep_log(&self, report: &SweepReport) {
        let entry = sweep_entry(report);

        if self.config.json_format {
            tracing::info!("{entry}");
        } else {
            tracing::info!(
                "SWEEP: 活跃 {} / 到期 {} / 写入 {} / 写入失败 {} / 取消 {}{}",
                report.active,
                report.due,
                report.dispatch.recorded,
                report.dispatch.record_failures,
                report.dispatch.cancelled,
                if report.aborted { " (已中止)" } else { "" }
            );
        }
    }

    /// 记录一次过期清理的结果
    pub fn purge_log(&self, deleted: Result<u64, &str>) {
        match deleted {
            Ok(count) if self.config.json_format => tracing::info!(
                "{}",
                json!({
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "type": "purge",
                    "deleted": count,
                })
            ),
            Ok(count) => tracing::info!("PURGE: 删除 {} 条过期记录", count),
            Err(e) => tracing::error!("PURGE: 清理失败 - {}", e),
        }
    }
}

fn sweep_entry(report: &SweepReport) -> serde_json::Value {
    json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "type": "sweep",
        "aborted": report.aborted,
        "active": report.active,
        "due": report.due,
        "not_due": report.not_due,
        "lookup_failures": report.lookup_failures,
        "probed": report.dispatch.probed,
        "recorded": report.dispatch.recorded,
        "record_failures": report.dispatch.record_failures,
        "cancelled": report.dispatch.cancelled,
        "panicked": report.dispatch.panicked,
    })
}

fn level_to_string(level: LevelFilter) -> &'static str {
    match level {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    #[test]
    fn test_log_config_from_config() {
        let mut logging = LoggingConfig {
            level: "debug".to_string(),
            json_format: true,
            ..LoggingConfig::default()
        };
        logging
            .module_levels
            .insert("reqwest".to_string(), "error".to_string());

        let config = LogConfig::from_config(&logging);
        assert_eq!(config.level, LevelFilter::Debug);
        assert!(config.json_format);
        assert_eq!(config.module_levels.get("reqwest"), Some(&LevelFilter::Error));
        assert_eq!(config.module_levels.get("sqlx"), Some(&LevelFilter::Warn));
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        assert_eq!(parse_level("chatty"), LevelFilter::Info);
        assert_eq!(parse_level("WARN"), LevelFilter::Warn);
    }

    #[test]
    fn test_env_filter_accepts_module_levels() {
        let mut config = LogConfig::default();
        config
            .module_levels
            .insert("uptime_vitals::health".to_string(), LevelFilter::Trace);
        assert!(LoggingSystem::build_env_filter(&config).is_ok());
    }

    #[test]
    fn test_sweep_entry_fields() {
        let report = SweepReport {
            active: 3,
            due: 2,
            not_due: 1,
            ..SweepReport::default()
        };
        let entry = sweep_entry(&report);
        assert_eq!(entry["type"], "sweep");
        assert_eq!(entry["active"], 3);
        assert_eq!(entry["due"], 2);
        assert_eq!(entry["aborted"], false);
    }

    #[tokio::test]
    #[serial]
    async fn test_logging_system_single_initialization() {
        LoggingSystem::reset_for_testing();

        let config = LogConfig::default();

        let first = LoggingSystem::setup_logging(config.clone());
        assert!(first.is_ok());
        assert!(LoggingSystem::is_initialized());

        // 第二次调用不会重复初始化
        let second = LoggingSystem::setup_logging(config.clone());
        assert!(second.is_ok());
        assert_eq!(LoggingSystem::current_config(), Some(config));
    }

    #[tokio::test]
    #[serial]
    async fn test_logging_system_with_file_output() {
        LoggingSystem::reset_for_testing();

        let dir = tempdir().unwrap();
        let config = LogConfig {
            file_path: Some(dir.path().join("logs").join("uptime.log")),
            json_format: true,
            ..LogConfig::default()
        };

        let system = LoggingSystem::setup_logging(config).unwrap();
        system.sweep_log(&SweepReport::default());
        system.purge_log(Ok(2));
        assert!(dir.path().join("logs").join("uptime.log").exists());
    }
}
