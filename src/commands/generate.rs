// src/commands/generate.rs

//! Generate target specs command

use crate::cli::GenerateArgs;
use anyhow::{Context, Result, bail};
use portconv::{PortageConverter, RunReport};
use tracing::info;

/// Convert the selected source packages into the target spec tree
///
/// Fails when the converter cannot start, when a package fails without
/// `--continue-with-error`, or when any package failed with it.
pub fn cmd_generate(args: &GenerateArgs) -> Result<()> {
    let options = args.to_options();
    let target = options.target_dir.clone();

    let converter = PortageConverter::new(options).context("Failed to initialize converter")?;
    info!(
        "Loaded {} source packages, writing to {}",
        converter.tree().len(),
        target.display()
    );

    let report = converter.generate().context("Generation failed")?;
    print_report(&report);

    if !report.is_success() {
        bail!("{} package(s) failed", report.failed.len());
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    for warning in &report.warnings {
        eprintln!("Warning: {}", warning);
    }
    for failed in &report.failed {
        eprintln!("Failed: {}", failed);
    }

    println!(
        "Generated: {}  Skipped: {}  Failed: {}",
        report.generated.len(),
        report.skipped.len(),
        report.failed.len()
    );
    if !report.warnings.is_empty() {
        println!("{} warning(s) - review generated specs", report.warnings.len());
    }
}
