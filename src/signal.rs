//! 信号处理模块
//!
//! 把 SIGINT / SIGTERM / Ctrl+C 转换为取消信号，用于优雅关闭

use crate::error::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[cfg(unix)]
use signal_hook::consts::{SIGINT, SIGTERM};
#[cfg(unix)]
use signal_hook_tokio::Signals;

/// 设置信号处理器，收到关闭信号时取消 `shutdown`
pub fn setup_signal_handlers(shutdown: CancellationToken) -> Result<()> {
    #[cfg(unix)]
    {
        setup_unix_signals(shutdown.clone())?;
    }

    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown.cancelled() => {}
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => {
                    info!("接收到 Ctrl+C，开始优雅关闭...");
                    shutdown.cancel();
                }
                Err(e) => error!("监听 Ctrl+C 失败: {e}"),
            },
        }
    });

    Ok(())
}

/// Unix/Linux系统信号处理
#[cfg(unix)]
fn setup_unix_signals(shutdown: CancellationToken) -> Result<()> {
    use futures::stream::StreamExt;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let handle = signals.handle();

    tokio::spawn(async move {
        loop {
            let signal = tokio::select! {
                _ = shutdown.cancelled() => break,
                signal = signals.next() => signal,
            };

            match signal {
                Some(SIGINT) => {
                    info!("接收到 SIGINT 信号，开始优雅关闭...");
                    shutdown.cancel();
                    break;
                }
                Some(SIGTERM) => {
                    info!("接收到 SIGTERM 信号，开始优雅关闭...");
                    shutdown.cancel();
                    break;
                }
                Some(other) => warn!("接收到未处理的信号: {other}"),
                None => break,
            }
        }
        handle.close();
    });

    Ok(())
}

/// 等待关闭信号
pub async fn wait_for_shutdown(shutdown: &CancellationToken) {
    shutdown.cancelled().await;
    info!("接收到关闭信号，开始清理资源...");
}
