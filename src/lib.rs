//! Build and image tooling for the BodyControlModule.
//!
//! Cross-compiles the application with the QNX `qcc` driver for either a
//! Raspberry Pi (ARM64) or an x86-64 virtual machine, then packages it into a
//! bootable QNX image with `mkqnximage`.
//!
//! - **Targets** - [`target`] maps each target to compiler flags and a binary suffix
//! - **Compilation** - [`compile`] locates `qcc`, collects sources and runs one compile
//! - **Images** - [`image`] recompiles, runs `mkqnximage` and prints operator guidance
//! - **Host plumbing** - [`process`] runs external commands, [`locate`] finds them
//!
//! # Architecture
//!
//! ```text
//! ImagePipeline (image)
//!     │
//!     ├── Compiler (compile)
//!     │       ├── require_tool (locate) ── qcc
//!     │       ├── TargetProfile (target)
//!     │       ├── collect_sources (sources)
//!     │       └── CommandRunner (process) ── qcc -o <bin> <flags> <sources>
//!     │
//!     ├── require_tool (locate) ── mkqnximage
//!     └── CommandRunner (process) ── mkqnximage --build <image flags>
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use bcm_builder::image::ImagePipeline;
//! use bcm_builder::locate::PathLocator;
//! use bcm_builder::process::SystemRunner;
//! use bcm_builder::{Project, Target};
//! use std::path::Path;
//!
//! let project = Project::open(Path::new("."))?;
//! let report = ImagePipeline::new(&project, &SystemRunner, &PathLocator::new())
//!     .run(Target::VirtualMachine)?;
//! for line in &report.guidance {
//!     println!("{line}");
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod compile;
pub mod config;
pub mod error;
pub mod image;
pub mod locate;
pub mod process;
pub mod project;
pub mod sources;
pub mod target;

pub use config::BuildConfig;
pub use error::BuildError;
pub use project::Project;
pub use target::Target;

/// Install the fmt subscriber used by the command-line entry points.
///
/// `RUST_LOG` overrides the default `info` level.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .try_init();
}

/// Map a failed run to a process exit code, reporting it on stderr.
///
/// Precondition failures print their message (and remediation) as-is;
/// external command failures keep their own code. Anything else (config
/// parsing, I/O in the entry points) counts as a precondition failure.
pub fn report_failure(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<BuildError>() {
        Some(build_err) if build_err.is_precondition() => {
            eprintln!("{build_err}");
            error::EXIT_PRECONDITION
        }
        Some(build_err) => {
            eprintln!("error: {err:#}");
            build_err.exit_code()
        }
        None => {
            eprintln!("error: {err:#}");
            error::EXIT_PRECONDITION
        }
    }
}
