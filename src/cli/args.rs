//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use crate::config::{get_default_config_path, LoggingConfig};
use crate::logging::LogConfig;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Uptime Vitals - 后台端点可用性监控工作器
#[derive(Parser, Debug, Clone)]
#[command(
    name = "uptime-vitals",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径",
        env = "UPTIME_VITALS_CONFIG",
        global = true
    )]
    pub config: Option<PathBuf>,

    /// 日志级别，覆盖配置文件中的设置
    #[arg(
        short,
        long,
        value_enum,
        help = "日志级别",
        env = "UPTIME_VITALS_LOG_LEVEL",
        global = true
    )]
    pub log_level: Option<LogLevel>,

    /// 以JSON格式输出日志
    #[arg(long, help = "以JSON格式输出日志", global = true)]
    pub json_logs: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    /// 跟踪级别
    Trace,
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 启动后台工作器，直到收到 SIGINT / SIGTERM
    Run,

    /// 立即执行一轮健康探测后退出
    Sweep {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },

    /// 立即清理一次过期记录后退出
    Purge,

    /// 验证配置文件
    Validate {
        /// 配置文件路径
        #[arg(value_name = "FILE", help = "配置文件路径")]
        config_path: Option<PathBuf>,

        /// 是否显示详细信息
        #[arg(short, long, help = "显示详细信息")]
        verbose: bool,
    },

    /// 初始化配置文件
    Init {
        /// 配置文件路径
        #[arg(
            value_name = "FILE",
            help = "配置文件路径",
            default_value = crate::config::loader::LOCAL_CONFIG_FILE
        )]
        config_path: PathBuf,

        /// 是否覆盖现有文件
        #[arg(short, long, help = "覆盖现有文件")]
        force: bool,
    },
}

/// 输出格式枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// 文本格式
    Text,
    /// JSON格式
    Json,
}

impl Args {
    /// 获取配置文件路径
    pub fn get_config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(get_default_config_path)
    }

    /// 合并命令行选项与配置文件中的日志设置
    pub fn log_config(&self, logging: &LoggingConfig) -> LogConfig {
        let mut config = LogConfig::from_config(logging);
        if let Some(level) = self.log_level {
            config.level = level.into();
        }
        if self.json_logs {
            config.json_format = true;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_global_options() {
        let args = Args::try_parse_from([
            "uptime-vitals",
            "run",
            "--config",
            "/etc/uptime.toml",
            "--log-level",
            "debug",
            "--json-logs",
        ])
        .unwrap();

        assert!(matches!(args.command, Commands::Run));
        assert_eq!(args.get_config_path(), PathBuf::from("/etc/uptime.toml"));
        assert_eq!(args.log_level, Some(LogLevel::Debug));

        let log_config = args.log_config(&LoggingConfig::default());
        assert_eq!(log_config.level, log::LevelFilter::Debug);
        assert!(log_config.json_format);
    }

    #[test]
    fn test_log_config_keeps_file_settings_without_overrides() {
        let args = Args::try_parse_from(["uptime-vitals", "purge"]).unwrap();
        let logging = LoggingConfig {
            level: "warn".to_string(),
            ..LoggingConfig::default()
        };

        let log_config = args.log_config(&logging);
        assert_eq!(log_config.level, log::LevelFilter::Warn);
        assert!(!log_config.json_format);
    }

    #[test]
    fn test_parse_init_defaults() {
        let args = Args::try_parse_from(["uptime-vitals", "init"]).unwrap();
        match args.command {
            Commands::Init { config_path, force } => {
                assert_eq!(config_path, PathBuf::from("uptime-vitals.toml"));
                assert!(!force);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_sweep_json() {
        let args = Args::try_parse_from(["uptime-vitals", "sweep", "--format", "json"]).unwrap();
        assert!(matches!(
            args.command,
            Commands::Sweep {
                format: OutputFormat::Json
            }
        ));
    }
}
