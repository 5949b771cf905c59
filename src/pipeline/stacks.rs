//! Stack discovery.
//!
//! A stack is a direct sub-directory of the stack root containing a
//! `docker-compose.yml`. Its directory name is the stack name, used both for
//! the image repository and for `docker stack deploy`.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{PipelineError, Result};

/// Compose file every stack directory must contain.
pub const COMPOSE_FILE: &str = "docker-compose.yml";

/// A deployable stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    /// Directory name; also the image and stack name.
    pub name: String,
    /// Absolute path of the stack directory.
    pub dir: PathBuf,
}

/// Lists the stacks under `root`, sorted by name.
///
/// Directories without a compose file and entries whose names are not UTF-8
/// are skipped.
pub fn discover_stacks(root: &Path) -> Result<Vec<Stack>> {
    let io_err = |source| PipelineError::Io {
        path: root.to_path_buf(),
        source,
    };

    let mut stacks = Vec::new();
    for entry in std::fs::read_dir(root).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let dir = entry.path();

        if !entry.file_type().map_err(io_err)?.is_dir() {
            continue;
        }

        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!(dir = %dir.display(), "Skipping stack directory with non UTF-8 name");
            continue;
        };

        if !dir.join(COMPOSE_FILE).is_file() {
            debug!(stack = %name, "Skipping directory without {COMPOSE_FILE}");
            continue;
        }

        stacks.push(Stack { name, dir });
    }

    stacks.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(stacks)
}
