//! Bootable image packaging.
//!
//! [`ImagePipeline`] recompiles the application for one target, runs
//! `mkqnximage` with that target's parameters and produces the operator
//! guidance for the finished image. A pipeline runs once; a failure at any
//! step leaves it in [`ImageStage::Failed`] and nothing after that step runs.
//! Nothing is rolled back.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::compile::{BuildOutput, Compiler};
use crate::error::BuildError;
use crate::locate::{require_tool, Tool, ToolLocator};
use crate::process::{Cmd, CommandRunner};
use crate::project::Project;
use crate::target::Target;

/// Flag asking the image tool to (re)build the image.
pub const BUILD_FLAG: &str = "--build";

/// Image tool parameters and operator guidance for one target.
///
/// Guidance lines may contain `{image_dir}` and `{tool}` placeholders.
#[derive(Debug, PartialEq, Eq)]
pub struct ImageProfile {
    pub target: Target,
    pub flags: &'static [&'static str],
    pub guidance: &'static [&'static str],
}

pub const IMAGE_PROFILES: &[ImageProfile] = &[
    ImageProfile {
        target: Target::Device,
        flags: &["--extra-dirs=+rasppi", "--type=rasppi", "--part-sizes=256:256"],
        guidance: &[
            "RPi image built",
            "The image is located at {image_dir}",
            "Flash it onto a microSD card with an imaging tool such as balenaEtcher",
        ],
    },
    ImageProfile {
        target: Target::VirtualMachine,
        flags: &["--type=vbox"],
        guidance: &[
            "VM image built",
            "Start the VM with \"{tool} --run\"",
            "Stop the VM with \"{tool} --stop\"",
            "Get the VM's address with \"{tool} --getip\" after starting it",
            "Log in with \"ssh -m hmac-sha2-256 root@<ip address from --getip>\" (password: \"root\")",
        ],
    },
];

pub fn image_profile(target: Target) -> &'static ImageProfile {
    IMAGE_PROFILES
        .iter()
        .find(|profile| profile.target == target)
        .unwrap_or_else(|| unreachable!("every target has an image profile row"))
}

/// One image tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSpec {
    pub tool: PathBuf,
    pub flags: Vec<String>,
}

impl ImageSpec {
    pub fn new(tool: PathBuf, target: Target) -> Self {
        let flags = std::iter::once(BUILD_FLAG)
            .chain(image_profile(target).flags.iter().copied())
            .map(str::to_string)
            .collect();
        Self { tool, flags }
    }

    pub fn to_cmd(&self, working_dir: &Path) -> Cmd {
        Cmd::new(&self.tool)
            .args(&self.flags)
            .current_dir(working_dir)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStage {
    NotStarted,
    Compiling,
    Compiled,
    Packaging,
    Done,
    Failed,
}

impl ImageStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn can_advance_to(self, next: ImageStage) -> bool {
        use ImageStage::*;
        matches!(
            (self, next),
            (NotStarted, Compiling)
                | (Compiling, Compiled)
                | (Compiling, Failed)
                | (Compiled, Packaging)
                | (Packaging, Done)
                | (Packaging, Failed)
        )
    }
}

impl fmt::Display for ImageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not-started",
            Self::Compiling => "compiling",
            Self::Compiled => "compiled",
            Self::Packaging => "packaging",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a finished pipeline hands back to the operator.
#[derive(Debug, Clone)]
pub struct ImageReport {
    pub target: Target,
    pub build: BuildOutput,
    pub image_dir: PathBuf,
    pub guidance: Vec<String>,
}

pub struct ImagePipeline<'a> {
    project: &'a Project,
    runner: &'a dyn CommandRunner,
    locator: &'a dyn ToolLocator,
    stage: ImageStage,
}

impl<'a> ImagePipeline<'a> {
    pub fn new(
        project: &'a Project,
        runner: &'a dyn CommandRunner,
        locator: &'a dyn ToolLocator,
    ) -> Self {
        Self {
            project,
            runner,
            locator,
            stage: ImageStage::NotStarted,
        }
    }

    pub fn stage(&self) -> ImageStage {
        self.stage
    }

    pub fn run(&mut self, target: Target) -> Result<ImageReport, BuildError> {
        if self.stage != ImageStage::NotStarted {
            return Err(BuildError::precondition(format!(
                "image pipeline already ran (stage: {})",
                self.stage
            )));
        }

        self.advance(ImageStage::Compiling);
        info!(
            "[image:{target}] building {}",
            self.project.config().compile.binary_name
        );
        let build = self.step(|pipeline| {
            Compiler::new(pipeline.project, pipeline.runner, pipeline.locator).build(target)
        })?;
        self.advance(ImageStage::Compiled);

        self.advance(ImageStage::Packaging);
        info!("[image:{target}] building QNX image");
        self.step(|pipeline| pipeline.package(target))?;
        self.advance(ImageStage::Done);

        let image_dir = self.project.image_output_dir();
        let guidance = guidance(target, &image_dir, &self.project.config().image.tool);
        Ok(ImageReport {
            target,
            build,
            image_dir,
            guidance,
        })
    }

    fn package(&self, target: Target) -> Result<(), BuildError> {
        let image = &self.project.config().image;
        let tool = require_tool(self.locator, &Tool::qnx(image.tool.as_str()))?;
        let spec = ImageSpec::new(tool, target);
        let cmd = spec
            .to_cmd(self.project.module_dir())
            .echo(true)
            .timeout(self.project.config().runner.timeout());
        self.runner.run(&cmd)?;
        Ok(())
    }

    fn step<T>(
        &mut self,
        f: impl FnOnce(&Self) -> Result<T, BuildError>,
    ) -> Result<T, BuildError> {
        let result = f(&*self);
        if result.is_err() {
            self.advance(ImageStage::Failed);
        }
        result
    }

    fn advance(&mut self, next: ImageStage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "invalid image stage transition {} -> {}",
            self.stage,
            next
        );
        debug!("image stage {} -> {}", self.stage, next);
        self.stage = next;
    }
}

/// Post-build instructions for the operator.
pub fn guidance(target: Target, image_dir: &Path, tool: &str) -> Vec<String> {
    let image_dir = image_dir.display().to_string();
    image_profile(target)
        .guidance
        .iter()
        .map(|line| line.replace("{image_dir}", &image_dir).replace("{tool}", tool))
        .collect()
}
