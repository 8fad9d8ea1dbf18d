//! Uptime Vitals 主程序入口
//!
//! 后台端点可用性监控工作器

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use uptime_vitals::cli::{
    load_config, Args, Command, Commands, ConfigSource, InitCommand, PurgeCommand, RunCommand, SweepCommand,
    ValidateCommand,
};
use uptime_vitals::config::{Config, LoggingConfig};
use uptime_vitals::logging::LoggingSystem;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // init / validate 不依赖现有配置
    let (config, source) = match &args.command {
        Commands::Init { .. } | Commands::Validate { .. } => (None, None),
        _ => {
            let (config, source) = load_config(&args).await.context("加载配置失败")?;
            (Some(config), Some(source))
        }
    };

    let logging_config = config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_else(LoggingConfig::default);
    let logging = LoggingSystem::setup_logging(args.log_config(&logging_config))
        .context("初始化日志系统失败")?;

    info!("Uptime Vitals v{} 启动", uptime_vitals::VERSION);
    match source {
        Some(ConfigSource::File(path)) => info!("已加载配置文件: {}", path.display()),
        Some(ConfigSource::Defaults(path)) => {
            warn!("未找到配置文件 {}，使用默认配置", path.display())
        }
        None => {}
    }

    if let Err(e) = execute_command(&args, config, logging).await {
        error!("命令执行失败: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// 执行CLI命令
async fn execute_command(
    args: &Args,
    config: Option<Config>,
    logging: LoggingSystem,
) -> Result<()> {
    let config = config.unwrap_or_default();

    let command: Box<dyn Command> = match &args.command {
        Commands::Run => Box::new(RunCommand::new(config)),
        Commands::Sweep { .. } => Box::new(SweepCommand::new(config, logging)),
        Commands::Purge => Box::new(PurgeCommand::new(config, logging)),
        Commands::Validate { .. } => Box::new(ValidateCommand),
        Commands::Init { .. } => Box::new(InitCommand),
    };

    command.execute(args).await.map_err(|e| anyhow::anyhow!(e))
}
