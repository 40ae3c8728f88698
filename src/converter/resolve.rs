// src/converter/resolve.rs

//! Per-package generation and dependency resolution
//!
//! A [`Worker`] generates one requested package together with every
//! dependency it has to materialize. Its chain of source atoms in progress
//! detects cycles: re-entering an atom already on the chain fails with a
//! cycle error, as does waiting on a claim whose owner waits on this
//! worker.
//!
//! An atom resolves, in order, against:
//!
//! 1. the registry (exact version when pinned, else the best satisfying one)
//! 2. registered artifacts that provide the atom's key
//! 3. the source tree, materializing the best match
//!
//! and is missing otherwise.

use super::claims::Claim;
use super::{Identity, LayerIndex, PortageConverter, RunReport};
use crate::artifact::{GeneratedArtifact, PackageRef, PackageSpec};
use crate::atom::PackageAtom;
use crate::distfile::ManifestFile;
use crate::error::{Error, Result};
use crate::rules::StagePolicy;
use crate::source::{depend, DepChoice, DepKind, SourcePackage, UseSet};
use crate::subsets::SUBSETS_ANNOTATION;
use crate::version::PkgVersion;
use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Label naming the source package a spec was generated from
const LABEL_ORIGINAL_NAME: &str = "original.package.name";
const LABEL_ORIGINAL_VERSION: &str = "original.package.version";

pub(super) struct Worker<'a> {
    conv: &'a PortageConverter,
    report: &'a Mutex<RunReport>,
    id: usize,
    /// Source atoms being generated, outermost first
    chain: Vec<String>,
}

impl<'a> Worker<'a> {
    pub(super) fn new(conv: &'a PortageConverter, report: &'a Mutex<RunReport>) -> Self {
        Self {
            conv,
            report,
            id: conv.next_worker.fetch_add(1, Ordering::Relaxed),
            chain: Vec::new(),
        }
    }

    fn cycle_error(&self, atom: &str) -> Error {
        let mut chain = self.chain.clone();
        chain.push(atom.to_string());
        Error::CycleError { chain }
    }

    /// Generate `pkg` unless it is already known, returning its identity
    pub(super) fn materialize(&mut self, pkg: &Arc<SourcePackage>) -> Result<Identity> {
        let atom = pkg.atom();
        if self.chain.contains(&atom) {
            return Err(self.cycle_error(&atom));
        }

        let identity = self.conv.identity_of(pkg);
        if self
            .conv
            .registry
            .get_version(&identity.key(), &identity.version)
            .is_ok()
        {
            return Ok(identity);
        }
        match self.conv.claims.acquire(&atom, self.id) {
            Claim::Acquired => {}
            Claim::Settled => {
                debug!("{} already handled", atom);
                return Ok(identity);
            }
            Claim::Cycle => return Err(self.cycle_error(&atom)),
        }

        let generated = self.generate(pkg, &identity);
        self.conv.claims.release(&atom, generated.is_ok());
        generated.map(|()| identity)
    }

    fn generate(&mut self, pkg: &SourcePackage, identity: &Identity) -> Result<()> {
        let conv = self.conv;
        let atom = pkg.atom();
        let key = pkg.key();
        let policy = conv.rules.stage_policy(&key, conv.options.stage_policy());
        let use_flags = pkg.enabled_use(
            conv.rules.forced_use_flags(&key),
            &conv.rules.disabled_use_flags(&key),
        );

        if let Some(layer) = &conv.layer {
            if self.layer_satisfied(layer, pkg, identity, &use_flags) {
                info!("{}: runtime dependencies already in layer, skipping", atom);
                self.report.lock().skipped.push(atom);
                return Ok(());
            }
        }

        if !conv.options.override_existing {
            if let Some(existing) =
                conv.writer
                    .load_definition(&identity.category, &identity.name, &identity.version)?
            {
                debug!("{} already exists, skipping", existing.human_readable());
                conv.registry
                    .register(GeneratedArtifact::new(existing, atom.clone()), false);
                self.report.lock().skipped.push(atom);
                return Ok(());
            }
        }

        self.chain.push(atom.clone());
        let built = self.build_artifact(pkg, identity, policy, &use_flags);
        self.chain.pop();
        let mut artifact = built?;

        attach_sources(conv, pkg, &mut artifact, &use_flags)?;

        artifact.subsets = conv.rules.subsets.resolve(
            &atom,
            &pkg.category,
            &key,
            artifact.compile.annotation(SUBSETS_ANNOTATION),
            &mut artifact.warnings,
        );
        if !artifact.subsets.is_empty() {
            let annotation = artifact.subsets.to_annotation();
            artifact
                .package_mut()
                .annotations
                .insert(SUBSETS_ANNOTATION.to_string(), annotation);
        }
        let archive = artifact
            .subsets
            .archive_spec(&conv.rules.subsets.enabled, &conv.rules.archive);
        artifact.finalizer = conv.rules.finalizer(&key);

        let warnings = artifact.warnings.clone();
        let registration = conv.registry.register(artifact, policy.conflicts);
        let stored = &registration.artifact;
        if let Err(e) = conv.writer.write(stored, &archive) {
            if registration.inserted {
                conv.registry.remove(&stored.key(), stored.version());
            }
            return Err(Error::EmissionError {
                package: stored.human_readable(),
                source: Box::new(e),
            });
        }
        for touched in registration.touched {
            conv.touched.insert(touched);
        }
        conv.emitted
            .insert((stored.key(), stored.version().to_string()));

        let mut report = self.report.lock();
        report.generated.push(stored.human_readable());
        report.warnings.extend(warnings);
        Ok(())
    }

    /// Compile and runtime specs with resolved dependencies
    fn build_artifact(
        &mut self,
        pkg: &SourcePackage,
        identity: &Identity,
        policy: StagePolicy,
        use_flags: &UseSet,
    ) -> Result<GeneratedArtifact> {
        let conv = self.conv;
        let atom = pkg.atom();
        let key = pkg.key();

        let mut compile = PackageSpec::new(&pkg.category, &pkg.name, &identity.version);
        compile.description = pkg.description.clone();
        compile.license = pkg.license.clone();
        compile.uses = use_flags.iter().cloned().collect();
        compile.labels.insert(LABEL_ORIGINAL_NAME.to_string(), key.clone());
        compile
            .labels
            .insert(LABEL_ORIGINAL_VERSION.to_string(), identity.version.clone());
        compile.annotations = pkg.annotations.clone();
        if let Some(extra) = conv.rules.annotations(&key) {
            compile.annotations.extend(extra.clone());
        }

        let mut artifact = GeneratedArtifact::new(compile, atom.clone());
        let mut warnings = Vec::new();

        let overridden = conv.rules.target_identity(&pkg.category, &pkg.name).is_some();
        if policy.stage2 || overridden {
            let mut runtime = artifact.compile.clone();
            runtime.category = identity.category.clone();
            runtime.name = identity.name.clone();

            if policy.stage2 {
                let deps = depend::evaluate(pkg.dependencies(DepKind::Runtime), use_flags);
                runtime.requires = self.resolve_choices(&atom, &deps.requires, false, &mut warnings)?;
                for blocker in &deps.blockers {
                    runtime.add_conflict(PackageRef::new(
                        &blocker.category,
                        &blocker.name,
                        blocker.constraint.selector(),
                    ));
                }
            }
            artifact.runtime = Some(runtime);
        }

        if policy.stage3 {
            let deps = depend::evaluate(pkg.dependencies(DepKind::Build), use_flags);
            artifact.compile.requires = self.resolve_choices(&atom, &deps.requires, false, &mut warnings)?;
        }

        if policy.stage4 {
            let deps = depend::evaluate(pkg.dependencies(DepKind::Post), use_flags);
            let post = self.resolve_choices(&atom, &deps.requires, true, &mut warnings)?;
            let target = artifact.package_mut();
            for dep in post {
                push_unique(&mut target.requires, dep);
            }
        }

        let provides: Vec<PackageRef> = conv
            .rules
            .provides(&key)
            .iter()
            .filter_map(|p| PackageRef::from_key(p))
            .collect();
        artifact.package_mut().provides.extend(provides);

        artifact.warnings = warnings;
        Ok(artifact)
    }

    /// Resolve evaluated requirements of `owner`
    ///
    /// Missing dependencies are dropped with a warning when the run ignores
    /// them. With `tolerant`, every failure but a fatal one is dropped with a
    /// warning.
    fn resolve_choices(
        &mut self,
        owner: &str,
        choices: &[DepChoice],
        tolerant: bool,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<PackageRef>> {
        let mut refs = Vec::new();

        for choice in choices {
            match self.resolve_choice(owner, choice) {
                Ok(found) => {
                    for dep in found {
                        push_unique(&mut refs, dep);
                    }
                }
                Err(e) if tolerant && !e.is_fatal() => {
                    let message = format!("{}: optional dependency {} skipped: {}", owner, choice, e);
                    warn!("{}", message);
                    warnings.push(message);
                }
                Err(e) if e.is_missing_dependency() && self.conv.options.ignore_missing_deps => {
                    let message = format!("{}: missing dependency {} ignored", owner, choice);
                    warn!("{}", message);
                    warnings.push(message);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(refs)
    }

    fn resolve_all(&mut self, owner: &str, choices: &[DepChoice]) -> Result<Vec<PackageRef>> {
        let mut refs = Vec::new();
        for choice in choices {
            for dep in self.resolve_choice(owner, choice)? {
                push_unique(&mut refs, dep);
            }
        }
        Ok(refs)
    }

    fn resolve_choice(&mut self, owner: &str, choice: &DepChoice) -> Result<Vec<PackageRef>> {
        let alternatives = match choice {
            DepChoice::One(atom) => return self.resolve_atom(owner, atom),
            DepChoice::AnyOf(alternatives) => alternatives,
        };

        let mut first_error = None;
        for alternative in alternatives {
            match self.resolve_all(owner, alternative) {
                Ok(refs) => return Ok(refs),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!("{}: alternative of {} unusable: {}", owner, choice, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        Err(first_error.unwrap_or_else(|| Error::MissingDependency {
            package: owner.to_string(),
            dependency: choice.to_string(),
        }))
    }

    fn resolve_atom(&mut self, owner: &str, atom: &PackageAtom) -> Result<Vec<PackageRef>> {
        let conv = self.conv;
        let key = atom.key();
        let selector = atom.constraint.selector();

        let registered = atom
            .constraint
            .pinned()
            .and_then(|version| conv.registry.get_version(&key, &version.to_string()).ok())
            .or_else(|| {
                conv.registry.get_sorted_by_key(&key).ok().and_then(|entries| {
                    entries.into_iter().find(|a| {
                        PkgVersion::parse(a.version()).is_ok_and(|v| atom.constraint.satisfies(&v))
                    })
                })
            });
        if let Some(artifact) = registered {
            let package = artifact.package();
            return Ok(vec![PackageRef::new(&package.category, &package.name, selector)]);
        }

        if let Some(provider) = conv.registry.get_provides(&key).first() {
            debug!("{}: {} provided by {}", owner, key, provider.human_readable());
            return Ok(vec![provider.package().to_ref()]);
        }

        let Some(pkg) = conv.tree.best_match(atom) else {
            return Err(Error::MissingDependency {
                package: owner.to_string(),
                dependency: atom.to_string(),
            });
        };

        if conv.is_native(&pkg) {
            return self.expand_native(&pkg);
        }
        if conv.rules.is_excluded(&pkg.key()) {
            debug!("{}: {} is excluded, referenced only", owner, pkg.atom());
            return Ok(vec![conv.identity_of(&pkg).to_ref(selector)]);
        }

        let identity = self.materialize(&pkg)?;
        Ok(vec![identity.to_ref(selector)])
    }

    /// Replace a native package by its own runtime dependencies
    fn expand_native(&mut self, pkg: &SourcePackage) -> Result<Vec<PackageRef>> {
        let atom = pkg.atom();
        if self.chain.contains(&atom) {
            return Err(self.cycle_error(&atom));
        }

        let key = pkg.key();
        let use_flags = pkg.enabled_use(
            self.conv.rules.forced_use_flags(&key),
            &self.conv.rules.disabled_use_flags(&key),
        );
        let deps = depend::evaluate(pkg.dependencies(DepKind::Runtime), &use_flags);
        debug!("Expanding native package {}", atom);

        self.chain.push(atom.clone());
        let resolved = self.resolve_all(&atom, &deps.requires);
        self.chain.pop();
        resolved
    }

    /// Whether the layer declares `pkg` and all its direct runtime dependencies
    fn layer_satisfied(
        &self,
        layer: &LayerIndex,
        pkg: &SourcePackage,
        identity: &Identity,
        use_flags: &UseSet,
    ) -> bool {
        if !layer.contains(&identity.key()) {
            return false;
        }
        let deps = depend::evaluate(pkg.dependencies(DepKind::Runtime), use_flags);
        deps.requires.iter().all(|c| self.in_layer(layer, c))
    }

    fn in_layer(&self, layer: &LayerIndex, choice: &DepChoice) -> bool {
        match choice {
            DepChoice::One(atom) => {
                let (category, name) = self
                    .conv
                    .rules
                    .target_identity(&atom.category, &atom.name)
                    .unwrap_or_else(|| (atom.category.clone(), atom.name.clone()));
                layer.contains(&format!("{}/{}", category, name))
            }
            DepChoice::AnyOf(alternatives) => alternatives
                .iter()
                .any(|alt| alt.iter().all(|c| self.in_layer(layer, c))),
        }
    }
}

fn push_unique(refs: &mut Vec<PackageRef>, dep: PackageRef) {
    if !refs.iter().any(|r| r.key() == dep.key()) {
        refs.push(dep);
    }
}

/// Resolve the distfiles of `pkg` into `artifact`
///
/// The on-disk manifest is preferred; reposcan metadata seeds it otherwise.
fn attach_sources(
    conv: &PortageConverter,
    pkg: &SourcePackage,
    artifact: &mut GeneratedArtifact,
    use_flags: &UseSet,
) -> Result<()> {
    let manifest_path = pkg.manifest_path();
    let manifest = if manifest_path.exists() {
        let manifest = ManifestFile::parse_file(&manifest_path)?;
        for warning in &manifest.warnings {
            artifact
                .warnings
                .push(format!("{}: {}", manifest_path.display(), warning));
        }
        manifest
    } else if let Some(files) = conv.reposcan.files(&pkg.atom()) {
        ManifestFile::new(files.to_vec())
    } else {
        ManifestFile::default()
    };

    let src_uri = depend::flatten_conditionals(&pkg.src_uri, use_flags).map_err(|e| {
        Error::parse(format!("{} (SRC_URI)", pkg.cache_path.display()), e.to_string())
    })?;

    artifact.files = manifest.resolve_source_uris(&src_uri);
    artifact.manifest_md5 = manifest.md5;
    Ok(())
}
