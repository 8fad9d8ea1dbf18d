//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::cli::args::{Args, Commands, OutputFormat};
use crate::config::{Config, ConfigLoader, DatabaseConfig, TomlConfigLoader};
use crate::error::{ConfigError, Result, UptimeVitalsError};
use crate::health::SweepReport;
use crate::logging::LoggingSystem;
use crate::repository::SqliteRepository;
use crate::signal::{setup_signal_handlers, wait_for_shutdown};
use crate::worker::MonitorWorker;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// 默认配置模板
pub const CONFIG_TEMPLATE: &str = include_str!("../../config/uptime-vitals.example.toml");

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 配置来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// 从配置文件加载
    File(PathBuf),
    /// 默认位置没有配置文件，使用默认配置
    Defaults(PathBuf),
}

/// 加载命令行指定的配置
///
/// 显式指定的文件必须存在；未指定且默认位置没有配置文件时使用默认配置。
/// 此时日志系统尚未初始化，来源由调用方在初始化日志后记录。
pub async fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    let path = args.get_config_path();
    let loader = TomlConfigLoader::new(true);

    match loader.load_from_file(&path).await {
        Ok(config) => Ok((config, ConfigSource::File(path))),
        Err(UptimeVitalsError::Config(ConfigError::FileNotFound { .. })) if args.config.is_none() => {
            Ok((Config::default(), ConfigSource::Defaults(path)))
        }
        Err(e) => Err(e),
    }
}

/// 打开 SQLite 仓库
pub async fn open_repository(database: &DatabaseConfig) -> Result<Arc<SqliteRepository>> {
    let repository = SqliteRepository::connect(&database.path, database.max_connections).await?;
    if database.ensure_schema {
        repository.ensure_schema().await?;
    }
    Ok(Arc::new(repository))
}

async fn build_worker(config: &Config) -> Result<MonitorWorker> {
    let repository = open_repository(&config.database).await?;
    MonitorWorker::with_http_prober(
        repository.clone(),
        repository,
        config.worker.to_settings(),
    )
}

/// 运行命令
pub struct RunCommand {
    config: Config,
}

impl RunCommand {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Command for RunCommand {
    async fn execute(&self, _args: &Args) -> Result<()> {
        let mut worker = build_worker(&self.config).await?;

        let shutdown = CancellationToken::new();
        setup_signal_handlers(shutdown.clone())?;

        worker.start();
        info!(
            sweep_interval_secs = self.config.worker.sweep_interval_seconds,
            max_concurrent_checks = self.config.worker.max_concurrent_checks,
            "{} v{} 正在运行，按 Ctrl+C 停止",
            crate::APP_NAME,
            crate::VERSION
        );

        wait_for_shutdown(&shutdown).await;
        worker.stop().await;

        Ok(())
    }
}

/// 单轮探测命令
pub struct SweepCommand {
    config: Config,
    logging: LoggingSystem,
}

impl SweepCommand {
    pub fn new(config: Config, logging: LoggingSystem) -> Self {
        Self { config, logging }
    }

    fn print_report(report: &SweepReport, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
            OutputFormat::Text => {
                if report.aborted {
                    println!("✗ 读取端点失败，本轮已中止");
                    return Ok(());
                }
                println!("活跃端点: {}", report.active);
                println!("到期探测: {}", report.due);
                println!("未到期:   {}", report.not_due);
                println!("查询失败: {}", report.lookup_failures);
                println!(
                    "写入成功: {}  写入失败: {}  异常: {}",
                    report.dispatch.recorded,
                    report.dispatch.record_failures,
                    report.dispatch.panicked
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Command for SweepCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let format = match &args.command {
            Commands::Sweep { format } => *format,
            _ => OutputFormat::Text,
        };

        let worker = build_worker(&self.config).await?;
        let report = worker.sweep_once().await;

        self.logging.sweep_log(&report);
        Self::print_report(&report, format)
    }
}

/// 过期清理命令
pub struct PurgeCommand {
    config: Config,
    logging: LoggingSystem,
}

impl PurgeCommand {
    pub fn new(config: Config, logging: LoggingSystem) -> Self {
        Self { config, logging }
    }
}

#[async_trait]
impl Command for PurgeCommand {
    async fn execute(&self, _args: &Args) -> Result<()> {
        let worker = build_worker(&self.config).await?;

        match worker.purge_once().await {
            Ok(deleted) => {
                self.logging.purge_log(Ok(deleted));
                println!("已删除 {deleted} 条过期记录");
                Ok(())
            }
            Err(e) => {
                self.logging.purge_log(Err(&e.to_string()));
                Err(e.into())
            }
        }
    }
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Validate {
            config_path,
            verbose,
        } = &args.command
        {
            let config_file = config_path
                .clone()
                .unwrap_or_else(|| args.get_config_path());

            self.validate_config_file(&config_file, *verbose).await?;
        }
        Ok(())
    }
}

impl ValidateCommand {
    /// 验证配置文件
    pub async fn validate_config_file(&self, config_path: &Path, verbose: bool) -> Result<Config> {
        println!("验证配置文件: {}", config_path.display());

        let loader = TomlConfigLoader::new(true);
        let config = loader.load_from_file(config_path).await?;

        println!("✓ 配置文件验证通过");
        if verbose {
            let worker = &config.worker;
            println!("工作器配置:");
            println!("  探测轮次间隔: {}秒", worker.sweep_interval_seconds);
            println!("  过期清理间隔: {}秒", worker.expiry_interval_seconds);
            println!("  请求超时: {}秒", worker.request_timeout_seconds);
            println!("  最大并发: {}", worker.max_concurrent_checks);
            println!("  User-Agent: {}", worker.to_settings().user_agent);
            println!("数据库: {}", config.database.path.display());
            println!("日志级别: {}", config.logging.level);
        }

        Ok(config)
    }
}

/// 初始化命令
pub struct InitCommand;

#[async_trait]
impl Command for InitCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Init { config_path, force } = &args.command {
            self.create_config_file(config_path, *force).await?;
        }
        Ok(())
    }
}

impl InitCommand {
    /// 创建配置文件，返回是否写入
    pub async fn create_config_file(&self, config_path: &Path, force: bool) -> Result<bool> {
        if config_path.exists() && !force {
            eprintln!("配置文件已存在: {}", config_path.display());
            eprintln!("使用 --force 参数覆盖现有文件");
            return Ok(false);
        }

        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(config_path, CONFIG_TEMPLATE).await?;

        println!("配置文件已创建: {}", config_path.display());
        Ok(true)
    }
}
