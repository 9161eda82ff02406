use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use bcm_builder::compile::Compiler;
use bcm_builder::locate::PathLocator;
use bcm_builder::process::SystemRunner;
use bcm_builder::project::resolve_root;
use bcm_builder::{Project, Target};
use clap::Parser;

/// Cross-compile the BodyControlModule for one target.
#[derive(Parser)]
#[command(name = "bcm-build")]
struct Cli {
    /// Target to compile for.
    #[arg(short = 'p', long, visible_alias = "platform", value_enum, default_value_t = Target::Device)]
    target: Target,

    /// Remove the build directory before compiling.
    #[arg(short, long)]
    clean: bool,

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

    let output = Compiler::new(&project, &SystemRunner, &PathLocator::new())
        .clean(cli.clean)
        .build(cli.target)?;

    println!("Built {}", output.binary.display());
    Ok(())
}
