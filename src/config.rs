//! Project configuration.
//!
//! An optional `bcm.toml` at the project root overrides tool names and
//! directory layout. Every field has a default, so a checkout without the
//! file builds exactly as the stock QNX setup expects.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const CONFIG_FILENAME: &str = "bcm.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BuildConfig {
    pub compile: CompileConfig,
    pub image: ImageConfig,
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CompileConfig {
    /// Directory under the project root that holds the application.
    pub module_dir: PathBuf,
    /// Source tree, relative to `module_dir`.
    pub source_dir: PathBuf,
    /// Binary base name; the target suffix is appended.
    pub binary_name: String,
    pub compiler: String,
    /// Removed by `--clean`, relative to `module_dir`.
    pub build_dir: PathBuf,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            module_dir: PathBuf::from("BodyControlModule"),
            source_dir: PathBuf::from("src"),
            binary_name: "BodyControlModule".to_string(),
            compiler: "qcc".to_string(),
            build_dir: PathBuf::from("build"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ImageConfig {
    pub tool: String,
    /// Where the image tool writes its output, relative to `module_dir`.
    pub output_dir: PathBuf,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            tool: "mkqnximage".to_string(),
            output_dir: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RunnerConfig {
    /// Kill external tools after this many seconds. Unset means wait forever.
    pub timeout_secs: Option<u64>,
}

impl RunnerConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl BuildConfig {
    /// Load `bcm.toml` from `project_root`, falling back to defaults.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = project_root.join(CONFIG_FILENAME);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading build config '{}'", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing build config '{}'", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        if config.compile.binary_name.trim().is_empty() {
            anyhow::bail!("compile.binary_name must not be empty");
        }
        Ok(config)
    }
}
