use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gitops_webhook::config::{Args, Config};
use gitops_webhook::lifecycle::{serve, shutdown_signal};
use gitops_webhook::persistence::DurableQueue;
use gitops_webhook::pipeline::DockerStackPipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(Config::from_args(Args::parse()).context("invalid configuration")?);
    init_tracing(&config.log_level);
    install_panic_hook();

    let queue = DurableQueue::provision(&config.queue_file).context("failed to provision queue")?;
    let pending = queue.pending().context("failed to read queue")?;
    info!(
        queue = %config.queue_file.display(),
        pending = pending.len(),
        "Queue ready"
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        addr = %addr,
        branch = %config.branch,
        "Server is listening on port {}",
        config.port
    );

    let pipeline = DockerStackPipeline::new(config.clone());
    serve(config, queue, pipeline, listener, shutdown_signal()).await?;
    Ok(())
}

/// `RUST_LOG` wins; otherwise the configured level applies to this crate and
/// to the HTTP trace layer.
fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{level},tower_http={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Any panic, in any task, terminates the process with status 1.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        error!(panic = %panic, "Unexpected panic, exiting");
        default_hook(panic);
        std::process::exit(1);
    }));
}
