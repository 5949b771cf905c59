//! Shared test utilities: proptest strategies, configuration, fake
//! pipelines, and git/docker fixtures.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use proptest::prelude::*;
use tempfile::TempDir;
use thiserror::Error;
use tokio::sync::{Notify, Semaphore};

use crate::config::Config;
use crate::pipeline::DeploymentPipeline;
use crate::types::CommitId;

pub const TEST_SECRET: &[u8] = b"test_secret";

pub fn arb_commit_id() -> impl Strategy<Value = CommitId> {
    "[0-9a-f]{7,40}".prop_map(CommitId::new)
}

/// Configuration rooted at `data_dir`, tracking `main` of the repository at
/// `repo`.
pub fn test_config(data_dir: &Path, repo: &Path) -> Config {
    Config {
        branch: "main".to_string(),
        repo: repo.display().to_string(),
        webhook_secret: TEST_SECRET.to_vec(),
        registry: "registry.test:5000".to_string(),
        queue_file: data_dir.join("queue"),
        data_dir: data_dir.to_path_buf(),
        stacks_folder: PathBuf::from("stacks"),
        port: 0,
        log_level: "debug".to_string(),
        poll_interval: Duration::from_millis(50),
        git_bin: PathBuf::from("git"),
        docker_bin: PathBuf::from("docker"),
    }
}

// ─── Fake pipeline ───

#[derive(Debug, Error)]
#[error("{step} failed for {commit}")]
pub struct FakeStepError {
    pub step: &'static str,
    pub commit: CommitId,
}

/// A pipeline that records every run. Individual commits can be made to fail
/// at the push step, and runs can be held until the test releases them.
#[derive(Debug, Clone, Default)]
pub struct RecordingPipeline {
    started: Arc<Mutex<Vec<CommitId>>>,
    completed: Arc<Mutex<Vec<CommitId>>>,
    fail_push: Arc<Mutex<HashSet<CommitId>>>,
    gate: Option<Arc<Semaphore>>,
    run_started: Arc<Notify>,
}

impl RecordingPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// A pipeline whose runs block until a permit is added to the returned
    /// semaphore (one permit per run).
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let pipeline = RecordingPipeline {
            gate: Some(gate.clone()),
            ..Self::default()
        };
        (pipeline, gate)
    }

    pub fn fail_push_for(&self, commit: &CommitId) {
        self.fail_push.lock().unwrap().insert(commit.clone());
    }

    /// Commits for which a run began, in order.
    pub fn started(&self) -> Vec<CommitId> {
        self.started.lock().unwrap().clone()
    }

    /// Commits whose run succeeded, in order.
    pub fn completed(&self) -> Vec<CommitId> {
        self.completed.lock().unwrap().clone()
    }

    /// Completes once a run has begun.
    pub async fn wait_for_start(&self) {
        self.run_started.notified().await;
    }
}

impl DeploymentPipeline for RecordingPipeline {
    type Error = FakeStepError;

    async fn run(&self, commit: &CommitId) -> Result<(), FakeStepError> {
        self.started.lock().unwrap().push(commit.clone());
        self.run_started.notify_one();

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        if self.fail_push.lock().unwrap().contains(commit) {
            return Err(FakeStepError {
                step: "push",
                commit: commit.clone(),
            });
        }

        self.completed.lock().unwrap().push(commit.clone());
        Ok(())
    }
}

// ─── Git fixture ───

/// A throwaway git repository on branch `main`.
///
/// Like GitHub, it serves any commit it holds to a fetch by id, even one no
/// branch points at.
pub struct GitFixture {
    dir: TempDir,
}

impl GitFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        git(dir.path(), &["init", "--quiet"]);
        git(dir.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(dir.path(), &["config", "user.email", "test@test.com"]);
        git(dir.path(), &["config", "user.name", "Test"]);
        git(dir.path(), &["config", "commit.gpgsign", "false"]);
        git(dir.path(), &["config", "uploadpack.allowAnySHA1InWant", "true"]);
        GitFixture { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// `file://` URL of the repository. Unlike a plain path, it makes git
    /// honour `--depth` when cloning.
    pub fn url(&self) -> String {
        format!("file://{}", self.path().display())
    }

    pub fn reset_hard(&self, revision: &str) {
        git(self.path(), &["reset", "--hard", "--quiet", revision]);
    }

    pub fn write_file(&self, relative: &str, contents: &str) {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    /// Commits everything in the working tree and returns the new HEAD.
    pub fn commit_all(&self, message: &str) -> CommitId {
        git(self.path(), &["add", "--all"]);
        git(self.path(), &["commit", "--quiet", "-m", message]);
        Self::head_of(self.path())
    }

    pub fn commit_file(&self, relative: &str, contents: &str) -> CommitId {
        self.write_file(relative, contents);
        self.commit_all(&format!("update {relative}"))
    }

    pub fn head_of(dir: &Path) -> CommitId {
        CommitId::new(git(dir, &["rev-parse", "HEAD"]))
    }
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

// ─── Docker fixture ───

/// A stand-in `docker` executable that appends `<cwd>|<$IMAGE>|<args>` to a
/// log file for every invocation, optionally failing one subcommand.
#[cfg(unix)]
pub struct FakeDocker {
    pub bin: PathBuf,
    log: PathBuf,
}

#[cfg(unix)]
impl FakeDocker {
    pub fn new(dir: &Path, fail_on: Option<&str>) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let bin = dir.join("fake-docker");
        let log = dir.join("docker-calls.log");

        let fail = fail_on
            .map(|sub| {
                format!("if [ \"$1\" = \"{sub}\" ]; then echo \"simulated {sub} failure\" >&2; exit 1; fi\n")
            })
            .unwrap_or_default();
        let script = format!(
            "#!/bin/sh\necho \"$(pwd -P)|${{IMAGE:-}}|$*\" >> '{}'\n{fail}exit 0\n",
            log.display()
        );

        std::fs::write(&bin, script).unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

        FakeDocker { bin, log }
    }

    pub fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
