//! OS signal handling.
//!
//! The entry point runs until Ctrl-C (SIGINT) or, on Unix, SIGTERM.

use tokio::signal;

/// Which signal ended the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Interrupt,
    Terminate,
}

/// Wait for the first stop signal.
pub async fn wait_for_stop_signal() -> std::io::Result<StopSignal> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => result.map(|()| StopSignal::Interrupt),
            _ = terminate.recv() => Ok(StopSignal::Terminate),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.map(|()| StopSignal::Interrupt)
    }
}
