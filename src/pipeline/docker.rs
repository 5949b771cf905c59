//! Docker Swarm deployment of every stack in the repository.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::checkout::sync_checkout;
use super::command::{command, execute};
use super::stacks::{COMPOSE_FILE, Stack, discover_stacks};
use super::{DeploymentPipeline, PipelineError, Result};
use crate::config::Config;
use crate::types::CommitId;

/// Environment variable through which the compose file receives the image.
pub const IMAGE_ENV: &str = "IMAGE";

/// Maximum length of a docker image tag.
const MAX_TAG_LEN: usize = 128;

/// Builds, pushes and deploys each stack of the tracked repository, tagging
/// images with the commit id.
#[derive(Debug, Clone)]
pub struct DockerStackPipeline {
    config: Arc<Config>,
}

impl DockerStackPipeline {
    /// Creates a pipeline using the given configuration.
    pub fn new(config: Arc<Config>) -> Self {
        DockerStackPipeline { config }
    }

    /// Image reference for a stack at a commit: `<registry>/<stack>:<commit>`.
    pub fn image_ref(&self, stack: &Stack, commit: &CommitId) -> String {
        format!("{}/{}:{}", self.config.registry, stack.name, commit)
    }

    #[instrument(skip_all, fields(stack = %stack.name))]
    async fn deploy_stack(&self, stack: &Stack, commit: &CommitId) -> Result<()> {
        let image = self.image_ref(stack, commit);
        let docker = &self.config.docker_bin;

        info!(image = %image, "Building image");
        let mut build = command(docker, &stack.dir);
        build.args(["build", "--pull", "--tag", image.as_str(), "."]);
        execute(&mut build).await?;

        info!(image = %image, "Pushing image");
        let mut push = command(docker, &stack.dir);
        push.args(["push", image.as_str()]);
        execute(&mut push).await?;

        info!(image = %image, "Deploying stack");
        let mut deploy = command(docker, &stack.dir);
        deploy
            .args(["stack", "deploy", "--prune", "--compose-file", COMPOSE_FILE])
            .arg(&stack.name)
            .env(IMAGE_ENV, &image);
        execute(&mut deploy).await?;

        Ok(())
    }
}

impl DeploymentPipeline for DockerStackPipeline {
    type Error = PipelineError;

    #[instrument(skip_all, fields(commit = %commit))]
    async fn run(&self, commit: &CommitId) -> Result<()> {
        validate_tag(commit)?;

        sync_checkout(&self.config, commit).await?;

        let stacks = discover_stacks(&self.config.stacks_dir())?;
        if stacks.is_empty() {
            warn!(
                root = %self.config.stacks_dir().display(),
                "No stacks found, nothing to deploy"
            );
        }

        for stack in &stacks {
            self.deploy_stack(stack, commit).await?;
        }

        info!(stacks = stacks.len(), "Deployed all stacks");
        Ok(())
    }
}

/// The commit id doubles as a git revision and an image tag, so it must
/// satisfy docker's tag grammar `[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}`. This
/// also keeps it from being read as a command-line option.
fn validate_tag(commit: &CommitId) -> Result<()> {
    let s = commit.as_str();
    let tag_char = |(i, c): (usize, char)| {
        c.is_ascii_alphanumeric() || c == '_' || (i > 0 && matches!(c, '.' | '-'))
    };
    let valid = !s.is_empty() && s.len() <= MAX_TAG_LEN && s.chars().enumerate().all(tag_char);

    if valid {
        Ok(())
    } else {
        Err(PipelineError::InvalidCommit(s.to_string()))
    }
}
