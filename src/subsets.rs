// src/subsets.rs

//! Subsets: named groups of path rules that are excluded from a generated
//! package unless the subset is explicitly enabled
//!
//! Definitions are merged per package from three sources. The package's
//! `subsets` annotation gives the baseline. Rules-document defaults are then
//! applied on top, replacing same-named subsets wholesale: package-level
//! defaults when present, otherwise category-level defaults (never both).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Annotation key carrying per-package subset rules
pub const SUBSETS_ANNOTATION: &str = "subsets";

/// One named subset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsetDefinition {
    #[serde(default, skip_serializing)]
    pub name: String,
    #[serde(default)]
    pub rules: Vec<String>,
}

impl SubsetDefinition {
    pub fn new(name: impl Into<String>, rules: Vec<String>) -> Self {
        Self {
            name: name.into(),
            rules,
        }
    }
}

/// Subset name -> definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsetsDefinition {
    pub definitions: BTreeMap<String, SubsetDefinition>,
}

/// Shape of the `subsets` annotation: `{ rules: { name: [pattern, ...] } }`
#[derive(Debug, Deserialize)]
struct SubsetsAnnotation {
    #[serde(default)]
    rules: BTreeMap<String, Vec<String>>,
}

impl SubsetsDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Decode an annotation payload, validating its shape up front
    pub fn from_annotation(value: &serde_json::Value) -> Result<Self, String> {
        let decoded: SubsetsAnnotation =
            serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;

        let definitions = decoded
            .rules
            .into_iter()
            .map(|(name, rules)| {
                let def = SubsetDefinition::new(name.clone(), rules);
                (name, def)
            })
            .collect();

        Ok(Self { definitions })
    }

    /// Encode back into the annotation shape
    pub fn to_annotation(&self) -> serde_json::Value {
        let rules: BTreeMap<&str, &Vec<String>> = self
            .definitions
            .iter()
            .map(|(name, def)| (name.as_str(), &def.rules))
            .collect();
        serde_json::json!({ "rules": rules })
    }

    /// Overwrite same-named entries with `other`'s
    fn overlay(&mut self, other: &BTreeMap<String, SubsetDefinition>) {
        for (name, def) in other {
            let mut def = def.clone();
            def.name = name.clone();
            self.definitions.insert(name.clone(), def);
        }
    }

    /// Build the archive configuration: rules of every subset that is not
    /// enabled become ignore patterns
    pub fn archive_spec(&self, enabled: &[String], config: &ArchiveConfig) -> ArchiveSpec {
        let mut spec = ArchiveSpec::from_config(config);

        for (name, def) in &self.definitions {
            if enabled.iter().any(|e| e == name) {
                continue;
            }
            debug!("Subset {} disabled, ignoring {:?}", name, def.rules);
            spec.ignore_regexes.extend(def.rules.iter().cloned());
        }

        spec
    }
}

/// Subset defaults declared in the rules document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsetsConfig {
    /// Subsets whose files are kept
    #[serde(default)]
    pub enabled: Vec<String>,

    /// Category -> subset defaults
    #[serde(default)]
    pub categories: HashMap<String, BTreeMap<String, SubsetDefinition>>,

    /// `category/name` -> subset defaults
    #[serde(default)]
    pub packages: HashMap<String, BTreeMap<String, SubsetDefinition>>,
}

impl SubsetsConfig {
    /// Effective subsets of one package
    ///
    /// `package` is used for log context only.
    pub fn resolve(
        &self,
        package: &str,
        category: &str,
        key: &str,
        annotation: Option<&serde_json::Value>,
        warnings: &mut Vec<String>,
    ) -> SubsetsDefinition {
        let mut resolved = match annotation {
            Some(value) => SubsetsDefinition::from_annotation(value).unwrap_or_else(|e| {
                let message = format!(
                    "[{}] Wrong format on {} annotation: {}",
                    package, SUBSETS_ANNOTATION, e
                );
                warn!("{}", message);
                warnings.push(message);
                SubsetsDefinition::new()
            }),
            None => SubsetsDefinition::new(),
        };

        if let Some(pkg_defaults) = self.packages.get(key) {
            resolved.overlay(pkg_defaults);
        } else if let Some(cat_defaults) = self.categories.get(category) {
            resolved.overlay(cat_defaults);
        }

        resolved
    }
}

fn default_true() -> bool {
    true
}

fn default_max_open_files() -> usize {
    100
}

fn default_buffer_size() -> usize {
    32
}

/// Baseline tunables of the archive builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_true")]
    pub same_owner: bool,
    #[serde(default = "default_true")]
    pub mutex_for_dirs: bool,
    #[serde(default = "default_max_open_files")]
    pub max_open_files: usize,
    /// Copy buffer size in KiB
    #[serde(default = "default_buffer_size")]
    pub copy_buffer_size: usize,
    #[serde(default)]
    pub validate: bool,
    #[serde(default)]
    pub overwrite_dir_perms: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            same_owner: true,
            mutex_for_dirs: true,
            max_open_files: default_max_open_files(),
            copy_buffer_size: default_buffer_size(),
            validate: false,
            overwrite_dir_perms: false,
        }
    }
}

/// Configuration handed to the archive backend for one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSpec {
    pub same_owner: bool,
    pub enable_mutex: bool,
    pub max_open_files: usize,
    pub buffer_size: usize,
    pub validate: bool,
    pub overwrite_perms: bool,
    pub ignore_regexes: Vec<String>,
    pub ignore_files: Vec<String>,
}

impl ArchiveSpec {
    fn from_config(config: &ArchiveConfig) -> Self {
        Self {
            same_owner: config.same_owner,
            enable_mutex: config.mutex_for_dirs,
            max_open_files: config.max_open_files,
            buffer_size: config.copy_buffer_size,
            validate: config.validate,
            overwrite_perms: config.overwrite_dir_perms,
            ignore_regexes: Vec::new(),
            ignore_files: Vec::new(),
        }
    }
}
