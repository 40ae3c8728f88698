// src/rules/mod.rs

//! Rules document
//!
//! The rules document carries the generation directives of a run: the
//! explicit package filter, globally disabled USE flags, reposcan sources,
//! exclusions, subset and archive defaults, and per-package overrides.
//!
//! # Example
//!
//! ```toml
//! [global]
//! packages = ["app-misc/foo"]
//! disable_use_flags = ["test"]
//! exclude = ["dev-lang/*"]
//!
//! [package."app-misc/foo"]
//! disable_stage3 = true
//! provides = ["virtual/foo"]
//! finalize = ["ldconfig"]
//! target = { category = "apps", name = "foo" }
//! ```
//!
//! A package absent from `[package]` only inherits the global directives.

use crate::atom::PackageAtom;
use crate::error::{Error, Result};
use crate::finalizer::Finalizer;
use crate::subsets::{ArchiveConfig, SubsetsConfig};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

fn default_native_categories() -> Vec<String> {
    vec!["virtual".to_string()]
}

/// `[global]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalRules {
    /// Explicit package filter (atoms)
    #[serde(default)]
    pub packages: Vec<String>,

    #[serde(default)]
    pub disable_use_flags: Vec<String>,

    #[serde(default)]
    pub reposcan_sources: Vec<PathBuf>,

    /// Glob patterns matched against `category/name`
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Categories whose packages are expanded into their dependencies
    #[serde(default = "default_native_categories")]
    pub native_categories: Vec<String>,
}

impl Default for GlobalRules {
    fn default() -> Self {
        Self {
            packages: Vec::new(),
            disable_use_flags: Vec::new(),
            reposcan_sources: Vec::new(),
            exclude: Vec::new(),
            native_categories: default_native_categories(),
        }
    }
}

/// Runtime identity override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetIdentity {
    pub category: Option<String>,
    pub name: Option<String>,
}

/// `[package."category/name"]` section
///
/// Stage toggles are optional so a package can override the run-wide
/// setting in either direction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageRules {
    pub disable_stage2: Option<bool>,
    pub disable_stage3: Option<bool>,
    pub enable_stage4: Option<bool>,
    pub disable_conflicts: Option<bool>,

    /// Never process this package
    #[serde(default)]
    pub skip: bool,

    /// Flags forced on
    #[serde(default)]
    pub use_flags: Vec<String>,

    #[serde(default)]
    pub disable_use_flags: Vec<String>,

    #[serde(default)]
    pub reposcan_sources: Vec<PathBuf>,

    /// Additional keys this package owns (`category/name`)
    #[serde(default)]
    pub provides: Vec<String>,

    /// Finalizer install steps
    #[serde(default)]
    pub finalize: Vec<String>,

    pub target: Option<TargetIdentity>,

    #[serde(default)]
    pub annotations: BTreeMap<String, serde_json::Value>,
}

/// Which pipeline stages run for a package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePolicy {
    pub stage2: bool,
    pub stage3: bool,
    pub stage4: bool,
    pub conflicts: bool,
}

impl Default for StagePolicy {
    fn default() -> Self {
        Self {
            stage2: true,
            stage3: true,
            stage4: false,
            conflicts: true,
        }
    }
}

/// Parsed rules document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub global: GlobalRules,

    #[serde(default)]
    pub subsets: SubsetsConfig,

    #[serde(default)]
    pub archive: ArchiveConfig,

    #[serde(default, rename = "package")]
    pub packages: HashMap<String, PackageRules>,

    #[serde(skip)]
    exclude_patterns: Vec<Pattern>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a rules document
    ///
    /// An empty path yields an empty rule set.
    pub fn load(path: &Path) -> Result<Self> {
        if path.as_os_str().is_empty() {
            debug!("No rules file given, using empty rules");
            return Ok(Self::new());
        }
        if !path.exists() {
            return Err(Error::NotFoundError(format!(
                "Rules file {} not found",
                path.display()
            )));
        }

        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let mut rules = Self::parse(&content, path)?;

        // Relative reposcan sources are relative to the rules file
        if let Some(base) = path.parent() {
            rules.rebase_sources(base);
        }

        info!(
            "Loaded rules from {} ({} package overrides)",
            path.display(),
            rules.packages.len()
        );
        Ok(rules)
    }

    /// Parse TOML content; `path` is used for error reporting only
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let parse_error = |message: String| Error::RulesParseError {
            path: path.to_path_buf(),
            message,
        };

        let mut rules: RuleSet = toml::from_str(content).map_err(|e| parse_error(e.to_string()))?;

        for atom in &rules.global.packages {
            PackageAtom::parse(atom).map_err(|e| parse_error(format!("global.packages: {}", e)))?;
        }
        rules.exclude_patterns = rules
            .global
            .exclude
            .iter()
            .map(|p| Pattern::new(p).map_err(|e| parse_error(format!("global.exclude '{}': {}", p, e))))
            .collect::<Result<_>>()?;
        for (key, pkg) in &rules.packages {
            if !key.contains('/') {
                return Err(parse_error(format!("package key '{}' is not category/name", key)));
            }
            if let Some(bad) = pkg.provides.iter().find(|p| !p.contains('/')) {
                return Err(parse_error(format!("{}: provides '{}' is not category/name", key, bad)));
            }
        }

        Ok(rules)
    }

    fn rebase_sources(&mut self, base: &Path) {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        self.global.reposcan_sources.iter_mut().for_each(rebase);
        for pkg in self.packages.values_mut() {
            pkg.reposcan_sources.iter_mut().for_each(rebase);
        }
    }

    /// Explicit package filter, if any
    pub fn package_filter(&self) -> Result<Vec<PackageAtom>> {
        self.global
            .packages
            .iter()
            .map(|a| {
                PackageAtom::parse(a).map_err(|e| Error::parse("rules global.packages", e.to_string()))
            })
            .collect()
    }

    pub fn package(&self, key: &str) -> Option<&PackageRules> {
        self.packages.get(key)
    }

    /// Stage policy of `key`, starting from the run-wide `base`
    pub fn stage_policy(&self, key: &str, base: StagePolicy) -> StagePolicy {
        let Some(pkg) = self.package(key) else {
            return base;
        };
        StagePolicy {
            stage2: pkg.disable_stage2.map_or(base.stage2, |d| !d),
            stage3: pkg.disable_stage3.map_or(base.stage3, |d| !d),
            stage4: pkg.enable_stage4.unwrap_or(base.stage4),
            conflicts: pkg.disable_conflicts.map_or(base.conflicts, |d| !d),
        }
    }

    /// Globally disabled flags followed by the package's own
    pub fn disabled_use_flags(&self, key: &str) -> Vec<String> {
        let mut flags = self.global.disable_use_flags.clone();
        if let Some(pkg) = self.package(key) {
            flags.extend(pkg.disable_use_flags.iter().cloned());
        }
        flags
    }

    pub fn forced_use_flags(&self, key: &str) -> &[String] {
        self.package(key).map_or(&[], |p| p.use_flags.as_slice())
    }

    /// Disable a flag for every package
    pub fn add_disabled_use_flag(&mut self, flag: impl Into<String>) {
        let flag = flag.into();
        if !self.global.disable_use_flags.contains(&flag) {
            self.global.disable_use_flags.push(flag);
        }
    }

    /// Every reposcan source, global ones first, without duplicates
    pub fn reposcan_sources(&self) -> Vec<PathBuf> {
        let mut keys: Vec<&String> = self.packages.keys().collect();
        keys.sort();

        let mut sources: Vec<PathBuf> = Vec::new();
        let package_sources = keys.into_iter().flat_map(|k| &self.packages[k].reposcan_sources);
        for source in self.global.reposcan_sources.iter().chain(package_sources) {
            if !sources.contains(source) {
                sources.push(source.clone());
            }
        }
        sources
    }

    /// Register one more reposcan source
    pub fn add_reposcan_source(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.global.reposcan_sources.contains(&path) {
            self.global.reposcan_sources.push(path);
        }
    }

    /// Whether `key` is excluded by a pattern or a `skip` directive
    pub fn is_excluded(&self, key: &str) -> bool {
        self.package(key).is_some_and(|p| p.skip)
            || self.exclude_patterns.iter().any(|p| p.matches(key))
    }

    pub fn is_native_category(&self, category: &str) -> bool {
        self.global.native_categories.iter().any(|c| c == category)
    }

    /// Runtime identity override of `key`, as `(category, name)`
    pub fn target_identity(&self, category: &str, name: &str) -> Option<(String, String)> {
        let target = self.package(&format!("{}/{}", category, name))?.target.as_ref()?;
        Some((
            target.category.clone().unwrap_or_else(|| category.to_string()),
            target.name.clone().unwrap_or_else(|| name.to_string()),
        ))
    }

    pub fn provides(&self, key: &str) -> &[String] {
        self.package(key).map_or(&[], |p| p.provides.as_slice())
    }

    pub fn finalizer(&self, key: &str) -> Option<Finalizer> {
        self.package(key)
            .map(|p| Finalizer::new(p.finalize.clone()))
            .filter(Finalizer::is_valid)
    }

    pub fn annotations(&self, key: &str) -> Option<&BTreeMap<String, serde_json::Value>> {
        self.package(key).map(|p| &p.annotations)
    }
}
