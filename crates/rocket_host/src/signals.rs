//! Signal handling for graceful shutdown.
//!
//! The host runs until the operator stops it. Stopping must still end every
//! plugin lifecycle, so termination signals are turned into an ordinary
//! return from [`wait_for_shutdown`] instead of killing the process.

use std::fmt;
use tokio::signal;
use tracing::info;

/// The signal that ended the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => write!(f, "SIGINT"),
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Waits until the process is asked to stop.
///
/// # Platform Support
///
/// * **Unix**: SIGINT and SIGTERM
/// * **Windows**: Ctrl+C, reported as [`ShutdownSignal::Interrupt`]
///
/// # Returns
///
/// The signal that was received, or an error if the signal listeners could
/// not be installed.
///
/// # Example
///
/// ```rust,ignore
/// let signal = signals::wait_for_shutdown().await?;
/// info!("stopping after {}", signal);
/// plugins.unload(&events);
/// ```
pub async fn wait_for_shutdown() -> anyhow::Result<ShutdownSignal> {
    let received = next_signal().await?;
    info!("📡 Received {}", received);
    Ok(received)
}

#[cfg(unix)]
async fn next_signal() -> anyhow::Result<ShutdownSignal> {
    use signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    let received = tokio::select! {
        _ = interrupt.recv() => ShutdownSignal::Interrupt,
        _ = terminate.recv() => ShutdownSignal::Terminate,
    };
    Ok(received)
}

#[cfg(not(unix))]
async fn next_signal() -> anyhow::Result<ShutdownSignal> {
    signal::ctrl_c().await?;
    Ok(ShutdownSignal::Interrupt)
}
