//! Deployment targets and their compiler profiles.
//!
//! [`PROFILES`] is the only place compile behavior varies by target. Adding a
//! target means adding a [`Target`] variant, one row here and one row in
//! [`crate::image::IMAGE_PROFILES`].

use std::fmt;

use clap::ValueEnum;

/// Warnings flag passed for every target.
pub const WARNINGS_FLAG: &str = "-Wall";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Target {
    /// Raspberry Pi (ARM64) single-board computer.
    #[value(name = "rpi", alias = "device")]
    Device,
    /// x86-64 virtual machine.
    #[value(name = "vm", alias = "virtual-machine")]
    VirtualMachine,
}

impl Target {
    pub const ALL: [Target; 2] = [Target::Device, Target::VirtualMachine];

    pub fn id(self) -> &'static str {
        match self {
            Self::Device => "rpi",
            Self::VirtualMachine => "vm",
        }
    }

    pub fn profile(self) -> &'static TargetProfile {
        resolve(self)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Compiler settings for one target.
#[derive(Debug, PartialEq, Eq)]
pub struct TargetProfile {
    pub target: Target,
    /// qcc `-V` selector for the cross-compiling backend.
    pub arch_flag: &'static str,
    /// Appended to the binary base name so targets never overwrite each other.
    pub binary_suffix: &'static str,
}

impl TargetProfile {
    /// Flags in command-line order.
    pub fn compiler_flags(&self) -> Vec<String> {
        vec![WARNINGS_FLAG.to_string(), self.arch_flag.to_string()]
    }

    pub fn binary_name(&self, base: &str) -> String {
        format!("{base}{}", self.binary_suffix)
    }
}

pub const PROFILES: &[TargetProfile] = &[
    TargetProfile {
        target: Target::Device,
        arch_flag: "-Vgcc_ntoaarch64le",
        binary_suffix: "_rpi",
    },
    TargetProfile {
        target: Target::VirtualMachine,
        arch_flag: "-Vgcc_ntox86_64",
        binary_suffix: "_vm",
    },
];

pub fn resolve(target: Target) -> &'static TargetProfile {
    PROFILES
        .iter()
        .find(|profile| profile.target == target)
        .unwrap_or_else(|| unreachable!("every target has a profile row"))
}
