//! Service lifecycle: runs the webhook receiver and the deployment worker
//! side by side and shuts both down together.
//!
//! Shutdown is triggered by the termination signal, by the receiver hitting
//! an unrecoverable queue error, or by either task ending on its own. In every
//! case the HTTP server stops accepting and drains open requests while the
//! worker finishes the deployment it is running.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::persistence::DurableQueue;
use crate::pipeline::DeploymentPipeline;
use crate::server::{AppState, build_router};
use crate::worker::{DeployWorker, WorkerError};

/// Reasons the service stopped other than a requested shutdown.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("deployment worker failed: {0}")]
    Worker(#[from] WorkerError),

    #[error("HTTP server failed: {0}")]
    Server(#[source] std::io::Error),

    #[error("webhook receiver hit an unrecoverable error")]
    Receiver,

    #[error("{task} task panicked: {source}")]
    Panicked {
        task: &'static str,
        #[source]
        source: JoinError,
    },
}

/// Serves webhooks on `listener` and deploys queued commits with `pipeline`
/// until `signal` completes or something fails.
///
/// Returns `Ok(())` only for a signalled shutdown in which nothing went
/// wrong.
pub async fn serve<P, S>(
    config: Arc<Config>,
    queue: DurableQueue,
    pipeline: P,
    listener: TcpListener,
    signal: S,
) -> Result<(), LifecycleError>
where
    P: DeploymentPipeline,
    S: Future<Output = ()> + Send,
{
    let shutdown = CancellationToken::new();
    let fatal = CancellationToken::new();

    let app = build_router(AppState::new(&config, queue.clone(), fatal.clone()));
    let server_stop = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(server_stop.cancelled_owned())
            .await
    });

    let worker = DeployWorker::new(&config, queue, pipeline);
    let mut worker = tokio::spawn(worker.run(shutdown.clone()));

    let mut server_result = None;
    let mut worker_result = None;
    tokio::select! {
        () = signal => info!("Termination signal received, shutting down"),
        () = fatal.cancelled() => error!("Webhook receiver failed, shutting down"),
        res = &mut server => server_result = Some(res),
        res = &mut worker => worker_result = Some(res),
    }
    shutdown.cancel();

    let server_result = match server_result {
        Some(res) => res,
        None => server.await,
    };
    let worker_result = match worker_result {
        Some(res) => res,
        None => worker.await,
    };

    match worker_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(e.into()),
        Err(source) => {
            return Err(LifecycleError::Panicked {
                task: "worker",
                source,
            });
        }
    }
    match server_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(LifecycleError::Server(e)),
        Err(source) => {
            return Err(LifecycleError::Panicked {
                task: "server",
                source,
            });
        }
    }
    if fatal.is_cancelled() {
        return Err(LifecycleError::Receiver);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Completes on SIGINT (Ctrl+C) or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
