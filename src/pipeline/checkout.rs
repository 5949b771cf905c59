//! Local checkout of the tracked repository.
//!
//! The checkout is created once with a shallow clone of the tracked branch
//! and reused afterwards. Each deployment fetches the requested commit
//! itself, since a queued commit may be older than the branch tip or gone
//! from the branch after a force-push, then detaches HEAD at it. `--force`
//! discards anything a previous build left in the working tree.

use std::path::Path;

use tracing::{debug, info};

use super::command::{execute, git_command};
use super::{PipelineError, Result};
use crate::config::{CHECKOUT_DIR, Config};
use crate::types::CommitId;

/// Makes `config.checkout_dir()` reflect `commit`.
pub async fn sync_checkout(config: &Config, commit: &CommitId) -> Result<()> {
    let checkout = config.checkout_dir();

    if !checkout.join(".git").exists() {
        clone_repo(config, &checkout).await?;
    }

    debug!(commit = %commit, "Fetching commit");
    let mut fetch = git_command(&config.git_bin, &checkout);
    fetch.args(["fetch", "--depth", "1", "origin", commit.as_str()]);
    execute(&mut fetch).await?;

    let mut checkout_cmd = git_command(&config.git_bin, &checkout);
    checkout_cmd.args(["checkout", "--force", "--detach", commit.as_str()]);
    execute(&mut checkout_cmd).await?;

    Ok(())
}

async fn clone_repo(config: &Config, checkout: &Path) -> Result<()> {
    info!(
        repo = %config.repo,
        dir = %checkout.display(),
        "Repository folder does not exist, cloning"
    );

    std::fs::create_dir_all(&config.data_dir).map_err(|source| PipelineError::Io {
        path: config.data_dir.clone(),
        source,
    })?;

    let mut clone = git_command(&config.git_bin, &config.data_dir);
    clone
        .args(["clone", "--depth", "1", "--branch"])
        .args([config.branch.as_str(), config.repo.as_str(), CHECKOUT_DIR]);
    execute(&mut clone).await?;

    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_utils::{GitFixture, test_config};
    use tempfile::tempdir;

    #[tokio::test]
    async fn clones_then_checks_out_commit() {
        let origin = GitFixture::new();
        let first = origin.commit_file("app.txt", "v1");
        let data = tempdir().unwrap();
        let mut config = test_config(data.path(), origin.path());
        config.repo = origin.url();

        sync_checkout(&config, &first).await.unwrap();

        let checkout = config.checkout_dir();
        assert_eq!(
            std::fs::read_to_string(checkout.join("app.txt")).unwrap(),
            "v1"
        );
        assert_eq!(GitFixture::head_of(&checkout), first);
    }

    #[tokio::test]
    async fn existing_checkout_moves_to_new_commit() {
        let origin = GitFixture::new();
        let first = origin.commit_file("app.txt", "v1");
        let data = tempdir().unwrap();
        let mut config = test_config(data.path(), origin.path());
        config.repo = origin.url();
        sync_checkout(&config, &first).await.unwrap();

        let second = origin.commit_file("app.txt", "v2");
        sync_checkout(&config, &second).await.unwrap();

        let checkout = config.checkout_dir();
        assert_eq!(
            std::fs::read_to_string(checkout.join("app.txt")).unwrap(),
            "v2"
        );
        assert_eq!(GitFixture::head_of(&checkout), second);
    }

    #[tokio::test]
    async fn redeploying_same_commit_is_harmless() {
        let origin = GitFixture::new();
        let first = origin.commit_file("app.txt", "v1");
        let data = tempdir().unwrap();
        let mut config = test_config(data.path(), origin.path());
        config.repo = origin.url();

        sync_checkout(&config, &first).await.unwrap();
        std::fs::write(config.checkout_dir().join("app.txt"), "dirty").unwrap();
        sync_checkout(&config, &first).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(config.checkout_dir().join("app.txt")).unwrap(),
            "v1"
        );
    }

    #[tokio::test]
    async fn first_deployment_of_commit_behind_tip() {
        let origin = GitFixture::new();
        let older = origin.commit_file("app.txt", "v1");
        origin.commit_file("app.txt", "v2");
        let data = tempdir().unwrap();
        let mut config = test_config(data.path(), origin.path());
        config.repo = origin.url();

        sync_checkout(&config, &older).await.unwrap();

        let checkout = config.checkout_dir();
        assert_eq!(GitFixture::head_of(&checkout), older);
        assert_eq!(
            std::fs::read_to_string(checkout.join("app.txt")).unwrap(),
            "v1"
        );
    }

    #[tokio::test]
    async fn commit_dropped_by_force_push_still_deploys() {
        let origin = GitFixture::new();
        origin.commit_file("app.txt", "v1");
        let dropped = origin.commit_file("app.txt", "v2");
        origin.reset_hard("HEAD~1");
        origin.commit_file("app.txt", "v3");
        let data = tempdir().unwrap();
        let mut config = test_config(data.path(), origin.path());
        config.repo = origin.url();

        sync_checkout(&config, &dropped).await.unwrap();

        assert_eq!(GitFixture::head_of(&config.checkout_dir()), dropped);
    }

    #[tokio::test]
    async fn unknown_commit_fails() {
        let origin = GitFixture::new();
        origin.commit_file("app.txt", "v1");
        let data = tempdir().unwrap();
        let mut config = test_config(data.path(), origin.path());
        config.repo = origin.url();

        let result = sync_checkout(&config, &CommitId::new("f".repeat(40))).await;
        assert!(matches!(result, Err(PipelineError::CommandFailed { .. })));
    }
}
