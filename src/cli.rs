// src/cli.rs
//! CLI definitions for portconv
//!
//! Command implementations live in the `commands` module.

use clap::{Args, Parser, Subcommand};
use portconv::ConverterOptions;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "portconv")]
#[command(author = "Portconv Contributors")]
#[command(version)]
#[command(about = "Convert ports-tree packages into binary-package build specs", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate target specs from source trees
    Generate(GenerateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Target spec tree directory
    #[arg(long, value_name = "DIR")]
    pub to: Option<PathBuf>,

    /// Source tree root (repeatable, later trees overlay earlier ones)
    #[arg(short, long = "tree", value_name = "DIR")]
    pub trees: Vec<PathBuf>,

    /// Package atom to generate (repeatable)
    #[arg(short, long = "pkg", value_name = "ATOM")]
    pub packages: Vec<String>,

    /// Rules document (TOML)
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Additional reposcan JSON source (repeatable)
    #[arg(long = "reposcan-files", value_name = "FILE")]
    pub reposcan_files: Vec<PathBuf>,

    /// USE flag disabled for every package (repeatable)
    #[arg(long = "disable-use-flag", value_name = "FLAG")]
    pub disable_use_flags: Vec<String>,

    /// Regenerate specs that already exist
    #[arg(long = "override")]
    pub override_existing: bool,

    /// Drop unresolvable dependencies with a warning
    #[arg(long)]
    pub ignore_missing_deps: bool,

    /// Keep going when a package fails
    #[arg(long)]
    pub continue_with_error: bool,

    /// Skip runtime dependency resolution
    #[arg(long)]
    pub disable_stage2: bool,

    /// Skip build dependency resolution
    #[arg(long)]
    pub disable_stage3: bool,

    /// Resolve post dependencies into runtime requires
    #[arg(long)]
    pub enable_stage4: bool,

    /// Do not record ownership conflicts
    #[arg(long)]
    pub disable_conflicts: bool,

    /// Skip packages whose runtime dependencies already exist in the target tree
    #[arg(long)]
    pub layer4rdepends: bool,

    /// Emit native-category packages instead of expanding them
    #[arg(long = "with-portage-pkg")]
    pub with_portage_pkgs: bool,

    /// Number of parallel workers
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

impl GenerateArgs {
    /// Converter options for these flags
    ///
    /// A missing `--to` maps to an empty target, which the converter
    /// rejects before doing any work.
    pub fn to_options(&self) -> ConverterOptions {
        ConverterOptions {
            target_dir: self.to.clone().unwrap_or_default(),
            trees: self.trees.clone(),
            packages: self.packages.clone(),
            rules_file: self.rules.clone(),
            reposcan_files: self.reposcan_files.clone(),
            disable_use_flags: self.disable_use_flags.clone(),
            override_existing: self.override_existing,
            ignore_missing_deps: self.ignore_missing_deps,
            continue_with_error: self.continue_with_error,
            disable_stage2: self.disable_stage2,
            disable_stage3: self.disable_stage3,
            enable_stage4: self.enable_stage4,
            disable_conflicts: self.disable_conflicts,
            layer4rdepends: self.layer4rdepends,
            with_portage_pkgs: self.with_portage_pkgs,
            jobs: self.jobs,
        }
    }
}
