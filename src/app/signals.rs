//! OS signal handling.
//!
//! Translates SIGINT/ctrl-c and SIGTERM into the shutdown watch channel the
//! run loop blocks on.

use tokio::sync::watch;
use tracing::{info, warn};

/// Install the signal handlers and return the shutdown receiver.
///
/// The first signal flips the channel to `true`; everything holding a
/// receiver observes it and winds down.
pub fn shutdown_channel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::select! {
            _ = interrupt() => {}
            _ = terminate() => {}
        }
        info!("Shutdown signal received");
        let _ = tx.send(true);
    });

    rx
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install interrupt handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
