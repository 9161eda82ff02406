//! Project layout.
//!
//! Every orchestrator takes a [`Project`] instead of relying on the process
//! working directory. The layout is validated once, in [`Project::open`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::BuildConfig;
use crate::error::BuildError;

#[derive(Debug, Clone)]
pub struct Project {
    module_dir: PathBuf,
    config: BuildConfig,
}

impl Project {
    /// Open the project at `root`, loading `bcm.toml` if present.
    pub fn open(root: &Path) -> Result<Self> {
        let config = BuildConfig::load(root)?;
        let project = Self::with_config(root, config)?;
        Ok(project)
    }

    /// Validate the layout under `root` against an already-loaded config.
    pub fn with_config(root: &Path, config: BuildConfig) -> Result<Self, BuildError> {
        if !root.is_dir() {
            return Err(BuildError::precondition(format!(
                "project root '{}' is not a directory",
                root.display()
            )));
        }
        let module_dir = root.join(&config.compile.module_dir);
        if !module_dir.is_dir() {
            return Err(BuildError::precondition(format!(
                "'{}' has no {} directory. Run this from the top-level project directory \
                 or pass --project-root.",
                root.display(),
                config.compile.module_dir.display()
            )));
        }
        Ok(Self {
            module_dir,
            config,
        })
    }

    pub fn module_dir(&self) -> &Path {
        &self.module_dir
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn build_dir(&self) -> PathBuf {
        self.module_dir.join(&self.config.compile.build_dir)
    }

    pub fn image_output_dir(&self) -> PathBuf {
        self.module_dir.join(&self.config.image.output_dir)
    }
}

/// Resolve the `--project-root` argument, defaulting to the working directory.
pub fn resolve_root(arg: Option<&Path>) -> Result<PathBuf> {
    match arg {
        Some(path) => Ok(path.to_path_buf()),
        None => std::env::current_dir().context("resolving current directory"),
    }
}
