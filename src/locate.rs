//! Host tool discovery.
//!
//! Both external collaborators (the QNX compiler driver and the image maker)
//! must be on the search path. A miss is not recoverable: the caller reports
//! the remediation text and exits.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::BuildError;

/// Remediation shown when a QNX SDP tool is missing.
pub const QNX_SDP_REMEDIATION: &str = "Make sure QNX SDP 8.0 is installed \
     and its environment script has been sourced \
     (qnxsdp-env.sh, or qnxsdp-env.bat on Windows).";

/// A required executable and what to tell the operator when it is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    pub name: String,
    pub remediation: String,
}

impl Tool {
    pub fn new(name: impl Into<String>, remediation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remediation: remediation.into(),
        }
    }

    /// A tool shipped with the QNX SDP.
    pub fn qnx(name: impl Into<String>) -> Self {
        Self::new(name, QNX_SDP_REMEDIATION)
    }
}

/// Resolves executable names to absolute paths.
pub trait ToolLocator {
    fn locate(&self, name: &str) -> Option<PathBuf>;
}

/// Looks tools up on `PATH`, or on an explicit search path.
#[derive(Debug, Default, Clone)]
pub struct PathLocator {
    search_path: Option<OsString>,
}

impl PathLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search only `paths` (same syntax as `PATH`) instead of the environment.
    pub fn with_search_path(paths: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(paths.into()),
        }
    }
}

impl ToolLocator for PathLocator {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        let found = match &self.search_path {
            None => which::which(name),
            Some(paths) => {
                let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
                which::which_in(name, Some(paths), cwd)
            }
        };
        match found {
            Ok(path) => Some(path),
            Err(err) => {
                debug!("{name} not found on search path: {err}");
                None
            }
        }
    }
}

/// Fixed name → path table. Useful where the search path must not matter.
#[derive(Debug, Default, Clone)]
pub struct StaticLocator {
    tools: HashMap<String, PathBuf>,
}

impl StaticLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, path: impl AsRef<Path>) -> Self {
        self.tools
            .insert(name.to_string(), path.as_ref().to_path_buf());
        self
    }
}

impl ToolLocator for StaticLocator {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        self.tools.get(name).cloned()
    }
}

/// Locate `tool` or fail with its remediation text.
pub fn require_tool(locator: &dyn ToolLocator, tool: &Tool) -> Result<PathBuf, BuildError> {
    match locator.locate(&tool.name) {
        Some(path) => {
            debug!("found {} at {}", tool.name, path.display());
            Ok(path)
        }
        None => Err(BuildError::ToolNotFound {
            tool: tool.name.clone(),
            remediation: tool.remediation.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn fake_executable(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_path_locator_finds_system_tool() {
        // 'sh' should exist on any Unix system
        assert!(PathLocator::new().locate("sh").is_some());
        assert!(PathLocator::new()
            .locate("definitely_not_a_real_command_12345")
            .is_none());
    }

    #[test]
    fn test_path_locator_explicit_search_path() {
        let temp = TempDir::new().unwrap();
        let qcc = fake_executable(temp.path(), "qcc");

        let locator = PathLocator::with_search_path(temp.path().as_os_str());
        assert_eq!(locator.locate("qcc"), Some(qcc));
        assert!(locator.locate("mkqnximage").is_none());
    }

    #[test]
    fn test_require_tool_missing_carries_remediation() {
        let err = require_tool(&StaticLocator::new(), &Tool::qnx("qcc")).unwrap_err();
        match &err {
            BuildError::ToolNotFound { tool, remediation } => {
                assert_eq!(tool, "qcc");
                assert!(remediation.contains("qnxsdp-env"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_require_tool_found() {
        let locator = StaticLocator::new().with("qcc", "/usr/bin/qcc");
        let path = require_tool(&locator, &Tool::qnx("qcc")).unwrap();
        assert_eq!(path, PathBuf::from("/usr/bin/qcc"));
    }
}
