use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use bcm_builder::image::ImagePipeline;
use bcm_builder::locate::PathLocator;
use bcm_builder::process::SystemRunner;
use bcm_builder::project::resolve_root;
use bcm_builder::{Project, Target};
use clap::Parser;

/// Build the BodyControlModule and package it into a bootable QNX image.
#[derive(Parser)]
#[command(name = "bcm-image")]
struct Cli {
    /// Target to build the image for.
    #[arg(long, value_enum, default_value_t = Target::Device)]
    target: Target,

    /// Top-level project directory (defaults to the current directory).
    #[arg(long)]
    project_root: Option<PathBuf>,
}

fn main() -> ExitCode {
    bcm_builder::init_logging();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => ExitCode::from(bcm_builder::report_failure(&err)),
    }
}

fn run(cli: Cli) -> Result<()> {
    let root = resolve_root(cli.project_root.as_deref())?;
    let project = Project::open(&root)?;

    println!("Building QNX image");
    let report =
        ImagePipeline::new(&project, &SystemRunner, &PathLocator::new()).run(cli.target)?;

    for line in &report.guidance {
        println!("{line}");
    }
    Ok(())
}
