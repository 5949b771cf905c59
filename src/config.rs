//! Service configuration.
//!
//! [`Args`] is the command-line / environment surface parsed by clap.
//! [`Config`] is the immutable value built from it once at startup and
//! shared (as `Arc<Config>`) with every component; nothing else reads the
//! process environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::webhooks::branch_ref;

/// Default delay between queue polls when no enqueue wakes the worker.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

/// Name of the checkout directory inside the data directory.
pub const CHECKOUT_DIR: &str = "repo";

/// Errors building a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither a secret nor a secret file was supplied.
    #[error("a webhook secret is required (--webhook-secret or --webhook-secret-file)")]
    MissingSecret,

    /// The secret resolved to an empty string.
    #[error("webhook secret is empty")]
    EmptySecret,

    /// The secret file could not be read.
    #[error("failed to read webhook secret file {}: {source}", path.display())]
    SecretFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required value was given but blank.
    #[error("{0} must not be empty")]
    Blank(&'static str),
}

/// Continuous-deployment webhook receiver.
///
/// Accepts signed GitHub push webhooks for one branch, queues the pushed
/// commit durably, and deploys every stack in the repository for each
/// queued commit, one at a time.
#[derive(Parser, Debug, Clone)]
#[command(name = "gitops-webhook", version)]
pub struct Args {
    /// Branch whose pushes trigger deployments.
    #[arg(long, env = "BRANCH_NAME")]
    pub branch: String,

    /// Repository to clone (URL or path).
    #[arg(long, env = "GITHUB_REPO")]
    pub repo: String,

    /// Shared webhook secret.
    #[arg(long, env = "GITHUB_WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: Option<String>,

    /// File containing the shared webhook secret.
    #[arg(
        long,
        env = "GITHUB_WEBHOOK_SECRET_FILE",
        conflicts_with = "webhook_secret"
    )]
    pub webhook_secret_file: Option<PathBuf>,

    /// Image registry images are pushed to, e.g. `registry.local:5000`.
    #[arg(long, env = "IMAGE_REGISTRY_URL")]
    pub registry: String,

    /// Path of the durable queue file.
    #[arg(long, env = "QUEUE_FILE", default_value = "/data/queue")]
    pub queue_file: PathBuf,

    /// Working directory; the repository is checked out in `<data-dir>/repo`.
    #[arg(long, env = "DATA_DIR", default_value = "/data")]
    pub data_dir: PathBuf,

    /// Folder inside the repository holding one sub-folder per stack.
    #[arg(long, env = "STACKS_FOLDER", default_value = "stacks")]
    pub stacks_folder: PathBuf,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 4000)]
    pub port: u16,

    /// Log level (`trace`, `debug`, `info`, `warn`, `error`). `RUST_LOG`
    /// takes precedence when set.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Fallback delay between queue polls, in milliseconds.
    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// git executable.
    #[arg(long, env = "GIT_BIN", default_value = "git")]
    pub git_bin: PathBuf,

    /// docker executable.
    #[arg(long, env = "DOCKER_BIN", default_value = "docker")]
    pub docker_bin: PathBuf,
}

/// Immutable service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Tracked branch name (without `refs/heads/`).
    pub branch: String,
    /// Repository to clone.
    pub repo: String,
    /// Webhook HMAC secret.
    pub webhook_secret: Vec<u8>,
    /// Registry prefix for image names.
    pub registry: String,
    /// Durable queue record.
    pub queue_file: PathBuf,
    /// Working directory for the checkout.
    pub data_dir: PathBuf,
    /// Stack root, relative to the checkout.
    pub stacks_folder: PathBuf,
    /// HTTP port.
    pub port: u16,
    /// Default log level.
    pub log_level: String,
    /// Fallback poll interval for an empty queue.
    pub poll_interval: Duration,
    /// git executable.
    pub git_bin: PathBuf,
    /// docker executable.
    pub docker_bin: PathBuf,
}

impl Config {
    /// Builds the configuration, reading the secret file if one was given.
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let webhook_secret = match (args.webhook_secret, args.webhook_secret_file) {
            (Some(secret), _) => secret.into_bytes(),
            (None, Some(path)) => read_secret_file(&path)?,
            (None, None) => return Err(ConfigError::MissingSecret),
        };
        if webhook_secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }

        for (name, value) in [
            ("branch", &args.branch),
            ("repo", &args.repo),
            ("registry", &args.registry),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Blank(name));
            }
        }

        Ok(Config {
            branch: args.branch,
            repo: args.repo,
            webhook_secret,
            registry: args.registry.trim_end_matches('/').to_string(),
            queue_file: args.queue_file,
            data_dir: args.data_dir,
            stacks_folder: args.stacks_folder,
            port: args.port,
            log_level: args.log_level,
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            git_bin: args.git_bin,
            docker_bin: args.docker_bin,
        })
    }

    /// The full ref pushes must target, e.g. `refs/heads/main`.
    pub fn tracked_ref(&self) -> String {
        branch_ref(&self.branch)
    }

    /// Where the repository is checked out.
    pub fn checkout_dir(&self) -> PathBuf {
        self.data_dir.join(CHECKOUT_DIR)
    }

    /// Directory holding one sub-directory per stack.
    pub fn stacks_dir(&self) -> PathBuf {
        self.checkout_dir().join(&self.stacks_folder)
    }
}

/// Reads a secret file, dropping trailing line terminators left by editors
/// and `echo`.
fn read_secret_file(path: &Path) -> Result<Vec<u8>, ConfigError> {
    let mut bytes = std::fs::read(path).map_err(|source| ConfigError::SecretFile {
        path: path.to_path_buf(),
        source,
    })?;
    while matches!(bytes.last(), Some(b'\n' | b'\r')) {
        bytes.pop();
    }
    Ok(bytes)
}
