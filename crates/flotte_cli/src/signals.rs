use flotte_core::orchestrator::{ShutdownCoordinator, SignalAction};
use tracing::{info, warn};

/// Forward SIGINT/SIGTERM to the coordinator until the task is aborted.
///
/// The first signal drains the queue; the second exits the process at once.
pub async fn watch(coordinator: ShutdownCoordinator) {
    if let Err(e) = forward_signals(&coordinator).await {
        warn!("Signal handling unavailable: {}", e);
    }
}

#[cfg(unix)]
async fn forward_signals(coordinator: &ShutdownCoordinator) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
        dispatch(coordinator);
    }
}

#[cfg(not(unix))]
async fn forward_signals(coordinator: &ShutdownCoordinator) -> std::io::Result<()> {
    loop {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl-C");
        dispatch(coordinator);
    }
}

fn dispatch(coordinator: &ShutdownCoordinator) {
    match coordinator.handle_signal() {
        SignalAction::Graceful => {
            eprintln!(
                "Shutting down: waiting for running jobs to stop. \
                 Press Ctrl-C again to force exit."
            );
        }
        action @ SignalAction::ForceExit => {
            eprintln!("Forced exit.");
            std::process::exit(action.exit_code());
        }
    }
}
