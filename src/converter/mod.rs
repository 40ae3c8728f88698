// src/converter/mod.rs

//! Conversion orchestrator
//!
//! [`PortageConverter`] turns source tree packages into target spec tree
//! entries. A run:
//!
//! 1. loads the rules document and the source trees (in parallel)
//! 2. selects the working set (explicit atoms, or every package that is
//!    not excluded)
//! 3. generates every selected package on a worker pool; dependencies are
//!    resolved stage by stage and materialized recursively
//! 4. rewrites definitions of already emitted artifacts that gained a
//!    conflict later in the run
//!
//! Each package identity is generated at most once per run. A worker that
//! meets a dependency claimed by another worker waits for the claimant and
//! only references it once it was generated successfully.
//!
//! Failing to write the target tree ends the run even with
//! `continue_with_error`.

mod claims;
pub mod emit;
mod resolve;

pub use emit::{FsSpecWriter, LayerIndex, SpecWriter};

use crate::artifact::{ArtifactRegistry, PackageRef};
use crate::atom::PackageAtom;
use crate::distfile::ReposcanIndex;
use crate::error::{Error, Result};
use crate::rules::{RuleSet, StagePolicy};
use crate::source::{SourcePackage, TreeIndex, TreeLoader};
use claims::ClaimTable;
use dashmap::DashSet;
use parking_lot::Mutex;
use rayon::prelude::*;
use resolve::Worker;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Settings of one conversion run
#[derive(Debug, Clone, Default)]
pub struct ConverterOptions {
    /// Target spec tree root
    pub target_dir: PathBuf,
    /// Source tree roots, later roots overlay earlier ones
    pub trees: Vec<PathBuf>,
    /// Explicit package atoms; overrides the rules filter
    pub packages: Vec<String>,
    pub rules_file: Option<PathBuf>,
    pub reposcan_files: Vec<PathBuf>,
    pub disable_use_flags: Vec<String>,
    /// Regenerate specs that already exist
    pub override_existing: bool,
    pub ignore_missing_deps: bool,
    pub continue_with_error: bool,
    pub disable_stage2: bool,
    pub disable_stage3: bool,
    pub enable_stage4: bool,
    pub disable_conflicts: bool,
    /// Skip packages whose runtime dependencies are already in the target tree
    pub layer4rdepends: bool,
    /// Emit native-category packages instead of expanding them
    pub with_portage_pkgs: bool,
    /// Worker count; rayon's default pool when unset
    pub jobs: Option<usize>,
}

impl ConverterOptions {
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            ..Default::default()
        }
    }

    /// Reject invocations that cannot start
    pub fn validate(&self) -> Result<()> {
        if self.target_dir.as_os_str().is_empty() {
            return Err(Error::UsageError("Missing --to argument".to_string()));
        }
        if self.jobs == Some(0) {
            return Err(Error::UsageError("--jobs must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Run-wide stage policy, before per-package rules
    pub fn stage_policy(&self) -> StagePolicy {
        StagePolicy {
            stage2: !self.disable_stage2,
            stage3: !self.disable_stage3,
            stage4: self.enable_stage4,
            conflicts: !self.disable_conflicts,
        }
    }
}

/// Outcome of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// `category/name-version` of every emitted artifact
    pub generated: Vec<String>,
    /// Source atoms left untouched
    pub skipped: Vec<String>,
    /// Source atoms whose generation failed
    pub failed: Vec<String>,
    pub warnings: Vec<String>,
}

impl RunReport {
    /// A run fails when any package failed
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn sort(&mut self) {
        self.generated.sort();
        self.skipped.sort();
        self.failed.sort();
    }
}

/// Identity of a generated package in the target tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Identity {
    pub category: String,
    pub name: String,
    pub version: String,
}

impl Identity {
    pub fn key(&self) -> String {
        format!("{}/{}", self.category, self.name)
    }

    pub fn to_ref(&self, selector: String) -> PackageRef {
        PackageRef::new(&self.category, &self.name, selector)
    }
}

/// Source tree to target spec tree converter
pub struct PortageConverter {
    options: ConverterOptions,
    rules: RuleSet,
    tree: TreeIndex,
    reposcan: ReposcanIndex,
    layer: Option<LayerIndex>,
    registry: ArtifactRegistry,
    writer: Box<dyn SpecWriter>,
    /// Source atoms claimed for generation
    claims: ClaimTable,
    /// Id source for workers, used to detect waits between them
    next_worker: AtomicUsize,
    /// (`key`, `version`) written during this run
    emitted: DashSet<(String, String)>,
    /// (`key`, `version`) that gained a conflict after registration
    touched: DashSet<(String, String)>,
}

impl PortageConverter {
    /// Load rules, trees and reposcan sources for `options`
    pub fn new(options: ConverterOptions) -> Result<Self> {
        options.validate()?;

        let rules_path = options.rules_file.clone().unwrap_or_default();
        let (rules, tree) = rayon::join(
            || RuleSet::load(&rules_path),
            || TreeLoader::new(&options.trees).load(),
        );
        let mut rules = rules?;
        let tree = tree?;
        if options.trees.is_empty() {
            warn!("No source trees defined");
        }

        for flag in &options.disable_use_flags {
            rules.add_disabled_use_flag(flag.as_str());
        }
        for source in &options.reposcan_files {
            rules.add_reposcan_source(source);
        }
        let reposcan = ReposcanIndex::load(&rules.reposcan_sources())?;

        let layer = if options.layer4rdepends {
            Some(LayerIndex::scan(&options.target_dir)?)
        } else {
            None
        };

        let writer = Box::new(FsSpecWriter::new(&options.target_dir));
        Ok(Self {
            options,
            rules,
            tree,
            reposcan,
            layer,
            registry: ArtifactRegistry::new(),
            writer,
            claims: ClaimTable::new(),
            next_worker: AtomicUsize::new(0),
            emitted: DashSet::new(),
            touched: DashSet::new(),
        })
    }

    /// Replace the spec destination
    pub fn with_writer(mut self, writer: Box<dyn SpecWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn options(&self) -> &ConverterOptions {
        &self.options
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn tree(&self) -> &TreeIndex {
        &self.tree
    }

    pub fn registry(&self) -> &ArtifactRegistry {
        &self.registry
    }

    /// Run the conversion over the working set
    pub fn generate(&self) -> Result<RunReport> {
        let report = Mutex::new(RunReport::default());
        let working = self.select(&report)?;
        info!("Processing {} packages", working.len());

        match self.options.jobs {
            Some(jobs) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(jobs)
                    .build()
                    .map_err(|e| Error::UsageError(format!("Cannot create worker pool: {}", e)))?;
                pool.install(|| self.process_all(&working, &report))?;
            }
            None => self.process_all(&working, &report)?,
        }

        self.refresh_conflicts()?;

        let mut report = report.into_inner();
        report.sort();
        info!(
            "Generated {} specs, skipped {}, failed {}",
            report.generated.len(),
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Packages requested by this run
    fn select(&self, report: &Mutex<RunReport>) -> Result<Vec<Arc<SourcePackage>>> {
        let atoms: Vec<PackageAtom> = if self.options.packages.is_empty() {
            self.rules.package_filter()?
        } else {
            self.options
                .packages
                .iter()
                .map(|a| {
                    PackageAtom::parse(a)
                        .map_err(|e| Error::UsageError(format!("Invalid package '{}': {}", a, e)))
                })
                .collect::<Result<_>>()?
        };

        let candidates: Vec<Arc<SourcePackage>> = if atoms.is_empty() {
            self.tree
                .all()
                .into_iter()
                .filter(|p| !self.rules.is_excluded(&p.key()))
                .collect()
        } else {
            atoms
                .iter()
                .map(|atom| {
                    self.tree.best_match(atom).ok_or_else(|| {
                        Error::NotFoundError(format!("Package {} not found in source trees", atom))
                    })
                })
                .collect::<Result<_>>()?
        };

        let mut seen = HashSet::new();
        let mut selected = Vec::new();
        for pkg in candidates {
            if !seen.insert(pkg.atom()) {
                continue;
            }
            if self.is_native(&pkg) {
                debug!("{} is a native package, not generated", pkg.atom());
                report.lock().skipped.push(pkg.atom());
                continue;
            }
            selected.push(pkg);
        }
        Ok(selected)
    }

    fn process_all(&self, working: &[Arc<SourcePackage>], report: &Mutex<RunReport>) -> Result<()> {
        working.par_iter().try_for_each(|pkg| {
            let mut worker = Worker::new(self, report);
            match worker.materialize(pkg) {
                Ok(_) => Ok(()),
                Err(source) => {
                    let err = Error::PackageFailed {
                        package: pkg.atom(),
                        source: Box::new(source),
                    };
                    if self.options.continue_with_error && !err.is_fatal() {
                        error!("{}", err);
                        report.lock().failed.push(pkg.atom());
                        Ok(())
                    } else {
                        Err(err)
                    }
                }
            }
        })
    }

    /// Rewrite definitions that gained a conflict after being written
    fn refresh_conflicts(&self) -> Result<()> {
        for entry in self.touched.iter() {
            if !self.emitted.contains(entry.key()) {
                continue;
            }
            let (key, version) = entry.key();
            let artifact = self.registry.get_version(key, version)?;
            debug!("Refreshing conflicts of {}", artifact.human_readable());
            self.writer
                .write_definition(&artifact)
                .map_err(|e| Error::EmissionError {
                    package: artifact.human_readable(),
                    source: Box::new(e),
                })?;
        }
        Ok(())
    }

    /// Target identity of a source package
    pub(crate) fn identity_of(&self, pkg: &SourcePackage) -> Identity {
        let (category, name) = self
            .rules
            .target_identity(&pkg.category, &pkg.name)
            .unwrap_or_else(|| (pkg.category.clone(), pkg.name.clone()));
        Identity {
            category,
            name,
            version: pkg.version.to_string(),
        }
    }

    /// Native packages are expanded into their dependencies
    pub(crate) fn is_native(&self, pkg: &SourcePackage) -> bool {
        !self.options.with_portage_pkgs && self.rules.is_native_category(&pkg.category)
    }
}
