//! Cross-compiling the application for one target.
//!
//! # Example
//!
//! ```rust,no_run
//! use bcm_builder::compile::Compiler;
//! use bcm_builder::locate::PathLocator;
//! use bcm_builder::process::SystemRunner;
//! use bcm_builder::{Project, Target};
//! use std::path::Path;
//!
//! let project = Project::open(Path::new("."))?;
//! let output = Compiler::new(&project, &SystemRunner, &PathLocator::new())
//!     .clean(true)
//!     .build(Target::Device)?;
//! println!("built {}", output.binary.display());
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::BuildError;
use crate::locate::{require_tool, Tool, ToolLocator};
use crate::process::{Cmd, CommandRunner};
use crate::project::Project;
use crate::sources::collect_sources;
use crate::target::Target;

/// One compiler run, fully determined before anything executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerInvocation {
    pub executable: PathBuf,
    pub flags: Vec<String>,
    pub sources: Vec<PathBuf>,
    pub output: String,
}

impl CompilerInvocation {
    /// `<exe> -o <output> <flags...> <sources...>`
    pub fn to_cmd(&self, working_dir: &Path) -> Cmd {
        Cmd::new(&self.executable)
            .arg("-o")
            .arg(&self.output)
            .args(&self.flags)
            .args(self.sources.iter().map(|source| source.as_os_str()))
            .current_dir(working_dir)
    }

    pub fn command_line(&self) -> String {
        self.to_cmd(Path::new(".")).command_line()
    }
}

/// A successful compile.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub target: Target,
    pub binary_name: String,
    /// Where the compiler was told to write the binary.
    pub binary: PathBuf,
    /// Captured compiler output.
    pub log: String,
}

pub struct Compiler<'a> {
    project: &'a Project,
    runner: &'a dyn CommandRunner,
    locator: &'a dyn ToolLocator,
    clean: bool,
}

impl<'a> Compiler<'a> {
    pub fn new(
        project: &'a Project,
        runner: &'a dyn CommandRunner,
        locator: &'a dyn ToolLocator,
    ) -> Self {
        Self {
            project,
            runner,
            locator,
            clean: false,
        }
    }

    /// Remove the build directory before compiling.
    pub fn clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    /// Locate the compiler, resolve the target profile and collect sources.
    ///
    /// Nothing is executed or removed here.
    pub fn plan(&self, target: Target) -> Result<CompilerInvocation, BuildError> {
        let compile = &self.project.config().compile;
        let executable = require_tool(self.locator, &Tool::qnx(compile.compiler.as_str()))?;
        let profile = target.profile();
        let sources = collect_sources(self.project.module_dir(), &compile.source_dir)?;

        Ok(CompilerInvocation {
            executable,
            flags: profile.compiler_flags(),
            sources,
            output: profile.binary_name(&compile.binary_name),
        })
    }

    pub fn build(&self, target: Target) -> Result<BuildOutput, BuildError> {
        let invocation = self.plan(target)?;

        if self.clean {
            remove_build_dir(&self.project.build_dir())?;
        }

        info!(
            "[build:{target}] compiling {} source file(s) into {}",
            invocation.sources.len(),
            invocation.output
        );

        let module_dir = self.project.module_dir();
        let cmd = invocation
            .to_cmd(module_dir)
            .echo(true)
            .timeout(self.project.config().runner.timeout());
        let output = self.runner.run(&cmd)?;

        info!("[build:{target}] built {}", invocation.output);
        Ok(BuildOutput {
            target,
            binary: module_dir.join(&invocation.output),
            binary_name: invocation.output,
            log: output.combined(),
        })
    }
}

fn remove_build_dir(build_dir: &Path) -> Result<(), BuildError> {
    if !build_dir.exists() {
        return Ok(());
    }
    info!("removing {}", build_dir.display());
    fs::remove_dir_all(build_dir).map_err(|source| BuildError::Io {
        action: "removing build directory",
        path: build_dir.to_path_buf(),
        source,
    })
}
