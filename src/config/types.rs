//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑

use crate::health::checker::default_user_agent;
use crate::worker::WorkerSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// 主配置结构
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// 工作器配置
    #[serde(default)]
    pub worker: WorkerConfig,
    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 工作器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// 健康探测轮次间隔（秒）
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// 过期记录清理间隔（秒）
    #[serde(default = "default_expiry_interval")]
    pub expiry_interval_seconds: u64,
    /// 请求超时时间（秒）
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    /// 最大并发探测数
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_checks: usize,
    /// 探测请求的 User-Agent，不设置时使用 `<包名>/<版本>`
    pub user_agent: Option<String>,
}

/// 数据库配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite 数据库文件路径
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// 连接池大小
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// 启动时是否自动建表
    #[serde(default = "default_ensure_schema")]
    pub ensure_schema: bool,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 是否使用JSON格式
    #[serde(default)]
    pub json_format: bool,
    /// 日志文件路径（可选，设置后不再输出到控制台）
    pub file_path: Option<PathBuf>,
    /// 模块级别日志控制，例如 `sqlx = "warn"`
    #[serde(default)]
    pub module_levels: HashMap<String, String>,
}

// 默认值函数
fn default_sweep_interval() -> u64 {
    60
}
fn default_expiry_interval() -> u64 {
    3600
}
fn default_timeout() -> u64 {
    10
}
fn default_max_concurrent() -> usize {
    10
}
fn default_db_path() -> PathBuf {
    PathBuf::from("./app.db")
}
fn default_max_connections() -> u32 {
    5
}
fn default_ensure_schema() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: default_sweep_interval(),
            expiry_interval_seconds: default_expiry_interval(),
            request_timeout_seconds: default_timeout(),
            max_concurrent_checks: default_max_concurrent(),
            user_agent: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
            ensure_schema: default_ensure_schema(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
            module_levels: HashMap::new(),
        }
    }
}

impl WorkerConfig {
    /// 转换为工作器运行参数
    pub fn to_settings(&self) -> WorkerSettings {
        WorkerSettings {
            sweep_interval: Duration::from_secs(self.sweep_interval_seconds),
            expiry_interval: Duration::from_secs(self.expiry_interval_seconds),
            request_timeout: Duration::from_secs(self.request_timeout_seconds),
            max_concurrent_checks: self.max_concurrent_checks,
            user_agent: self
                .user_agent
                .clone()
                .filter(|ua| !ua.trim().is_empty())
                .unwrap_or_else(default_user_agent),
        }
    }
}

/// 支持的日志级别
pub const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    let worker = &config.worker;

    if worker.sweep_interval_seconds == 0 {
        return Err("探测轮次间隔不能为0".to_string());
    }

    if worker.expiry_interval_seconds == 0 {
        return Err("过期清理间隔不能为0".to_string());
    }

    if worker.request_timeout_seconds == 0 {
        return Err("请求超时时间不能为0".to_string());
    }

    if worker.max_concurrent_checks == 0 {
        return Err("最大并发探测数不能为0".to_string());
    }

    if config.database.path.as_os_str().is_empty() {
        return Err("数据库路径不能为空".to_string());
    }

    if config.database.max_connections == 0 {
        return Err("数据库连接池大小不能为0".to_string());
    }

    // 验证日志级别
    let levels = std::iter::once(&config.logging.level).chain(config.logging.module_levels.values());
    for level in levels {
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(format!(
                "无效的日志级别: {}，支持的级别: {:?}",
                level, VALID_LOG_LEVELS
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.worker.sweep_interval_seconds, 60);
        assert_eq!(config.worker.expiry_interval_seconds, 3600);
        assert_eq!(config.worker.request_timeout_seconds, 10);
        assert_eq!(config.worker.max_concurrent_checks, 10);
        assert_eq!(config.database.path, PathBuf::from("./app.db"));
        assert_eq!(config.logging.level, "info");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.worker.max_concurrent_checks = 4;
        config.worker.user_agent = Some("UptimeNinja/1.0".to_string());

        let serialized = toml::to_string(&config).expect("序列化失败");
        let deserialized: Config = toml::from_str(&serialized).expect("反序列化失败");
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_to_settings() {
        let worker = WorkerConfig {
            sweep_interval_seconds: 30,
            expiry_interval_seconds: 600,
            request_timeout_seconds: 5,
            max_concurrent_checks: 3,
            user_agent: Some("UptimeNinja/1.0".to_string()),
        };

        let settings = worker.to_settings();
        assert_eq!(settings.sweep_interval, Duration::from_secs(30));
        assert_eq!(settings.expiry_interval, Duration::from_secs(600));
        assert_eq!(settings.request_timeout, Duration::from_secs(5));
        assert_eq!(settings.max_concurrent_checks, 3);
        assert_eq!(settings.user_agent, "UptimeNinja/1.0");
    }

    #[test]
    fn test_blank_user_agent_falls_back_to_default() {
        let worker = WorkerConfig {
            user_agent: Some("  ".to_string()),
            ..WorkerConfig::default()
        };
        assert_eq!(worker.to_settings().user_agent, default_user_agent());
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let mut config = Config::default();
        config.worker.sweep_interval_seconds = 0;
        assert!(validate_config(&config).unwrap_err().contains("轮次间隔"));

        let mut config = Config::default();
        config.worker.max_concurrent_checks = 0;
        assert!(validate_config(&config).unwrap_err().contains("并发"));

        let mut config = Config::default();
        config.worker.request_timeout_seconds = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.worker.expiry_interval_seconds = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_rejects_unknown_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config
            .logging
            .module_levels
            .insert("sqlx".to_string(), "loud".to_string());
        assert!(validate_config(&config).is_err());
    }
}
