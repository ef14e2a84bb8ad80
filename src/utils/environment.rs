// Process environment: docker detection, engine location, target paths

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::utils::constants::{
    DEFAULT_ENGINE_BINARY, ENGINE_ENV, IN_DOCKER_ENV, IN_GH_ACTION_ENV, REPO_HOME_DOCKER,
};
use crate::utils::error::{LintError, Result};

/// Settings read once from the process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub in_docker: bool,
    pub in_gh_action: bool,
    pub repo_home: PathBuf,
    pub engine_binary: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            in_docker: false,
            in_gh_action: false,
            repo_home: PathBuf::from(REPO_HOME_DOCKER),
            engine_binary: DEFAULT_ENGINE_BINARY.to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            in_docker: env::var_os(IN_DOCKER_ENV).is_some(),
            in_gh_action: env::var_os(IN_GH_ACTION_ENV).is_some(),
            repo_home: PathBuf::from(REPO_HOME_DOCKER),
            engine_binary: env::var(ENGINE_ENV).unwrap_or_else(|_| DEFAULT_ENGINE_BINARY.to_string()),
        }
    }

    /// Extra hint appended to "path does not exist" errors.
    pub fn missing_path_hint(&self) -> String {
        if self.in_docker {
            " (since you are running in docker, you cannot specify arbitary paths on the host; they must be mounted into the container)".to_string()
        } else {
            String::new()
        }
    }
}

/// Change into the mounted repository when running inside the docker image.
///
/// Inside docker (and outside a GitHub action or pre-commit hook) the
/// repository must have been mounted at the repo home; that is a hard error
/// otherwise. Whenever the repo home exists the process moves into it so
/// every relative path resolves against the mounted repository.
pub fn adjust_for_docker(settings: &Settings, in_precommit: bool) -> Result<()> {
    let repo_home_exists = settings.repo_home.exists();

    if settings.in_docker && !settings.in_gh_action && !in_precommit && !repo_home_exists {
        return Err(LintError::ConfigError(format!(
            "you are running sgrep in docker, but you forgot to mount the current directory in Docker: missing: -v \"${{PWD}}:{}\"",
            settings.repo_home.display()
        )));
    }

    if repo_home_exists {
        debug!(path = %settings.repo_home.display(), "changing into docker repo home");
        env::set_current_dir(&settings.repo_home)?;
    }

    Ok(())
}

pub fn get_base_path() -> PathBuf {
    PathBuf::from(".")
}

/// Absolute targets are kept; relative ones are anchored at the base path.
pub fn resolve_targets<S: AsRef<str>>(targets: &[S]) -> Vec<PathBuf> {
    let base_path = get_base_path();
    targets
        .iter()
        .map(|target| {
            let path = Path::new(target.as_ref());
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                base_path.join(path)
            }
        })
        .collect()
}
