// src/artifact/mod.rs

//! Generated artifacts
//!
//! An artifact is one resolved `(package, version)` pair: its compile spec,
//! an optional distinct runtime spec, the distfiles it downloads, its
//! effective subsets and an optional finalizer.
//!
//! The identity key of an artifact is `category/name` of its runtime spec
//! when one exists, otherwise of its compile spec. Every registry lookup and
//! conflict check goes through [`GeneratedArtifact::key`].

pub mod conflicts;
pub mod registry;

pub use registry::{ArtifactRegistry, ArtifactsMap, ArtifactsPack, Registration};

use crate::distfile::DistFile;
use crate::error::Result;
use crate::finalizer::Finalizer;
use crate::subsets::SubsetsDefinition;
use crate::version::PkgVersion;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

fn any_version() -> String {
    ">=0".to_string()
}

/// Reference to another package of the target tree
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackageRef {
    pub category: String,
    pub name: String,
    /// Version selector, e.g. `>=1.2`
    #[serde(default = "any_version")]
    pub version: String,
}

impl PackageRef {
    pub fn new(category: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// Parse `category/name` into an any-version reference
    pub fn from_key(key: &str) -> Option<Self> {
        let (category, name) = key.split_once('/')?;
        if category.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(category, name, any_version()))
    }

    pub fn key(&self) -> String {
        format!("{}/{}", self.category, self.name)
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}", self.category, self.name, self.version)
    }
}

/// Package metadata of one spec file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    pub category: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<PackageRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<PackageRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<PackageRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uses: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, serde_json::Value>,
}

impl PackageSpec {
    pub fn new(category: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            version: version.into(),
            description: None,
            license: None,
            requires: Vec::new(),
            conflicts: Vec::new(),
            provides: Vec::new(),
            uses: Vec::new(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }

    /// `category/name`
    pub fn package_name(&self) -> String {
        format!("{}/{}", self.category, self.name)
    }

    /// `category/name-version`
    pub fn human_readable(&self) -> String {
        format!("{}/{}-{}", self.category, self.name, self.version)
    }

    /// Any-version reference to this package
    pub fn to_ref(&self) -> PackageRef {
        PackageRef::new(&self.category, &self.name, any_version())
    }

    pub fn parsed_version(&self) -> Result<PkgVersion> {
        PkgVersion::parse(&self.version)
    }

    pub fn has_annotation(&self, key: &str) -> bool {
        self.annotations.contains_key(key)
    }

    pub fn annotation(&self, key: &str) -> Option<&serde_json::Value> {
        self.annotations.get(key)
    }

    /// Whether this package declares it provides `key`
    pub fn provides_key(&self, key: &str) -> bool {
        self.provides.iter().any(|p| p.key() == key)
    }

    /// Add a conflict unless already declared
    pub fn add_conflict(&mut self, conflict: PackageRef) -> bool {
        if self.conflicts.iter().any(|c| c.key() == conflict.key()) {
            return false;
        }
        self.conflicts.push(conflict);
        self.conflicts.sort();
        true
    }
}

/// One generated `(package, version)` pair
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedArtifact {
    /// Build specification
    pub compile: PackageSpec,
    /// Runtime specification, when it is produced separately
    pub runtime: Option<PackageSpec>,
    /// Source package this artifact was generated from (`category/name-version`)
    pub source: String,
    /// Distfiles resolved from the manifest
    pub files: Vec<DistFile>,
    /// MD5 of the source manifest, for change detection
    pub manifest_md5: String,
    /// Effective subsets
    pub subsets: SubsetsDefinition,
    pub finalizer: Option<Finalizer>,
    /// Non-fatal problems hit while generating
    pub warnings: Vec<String>,
}

impl GeneratedArtifact {
    pub fn new(compile: PackageSpec, source: impl Into<String>) -> Self {
        Self {
            compile,
            runtime: None,
            source: source.into(),
            files: Vec::new(),
            manifest_md5: String::new(),
            subsets: SubsetsDefinition::new(),
            finalizer: None,
            warnings: Vec::new(),
        }
    }

    /// Spec that identifies this artifact: runtime when present
    pub fn package(&self) -> &PackageSpec {
        self.runtime.as_ref().unwrap_or(&self.compile)
    }

    pub fn package_mut(&mut self) -> &mut PackageSpec {
        self.runtime.as_mut().unwrap_or(&mut self.compile)
    }

    /// Identity key used by the registry
    pub fn key(&self) -> String {
        self.package().package_name()
    }

    pub fn version(&self) -> &str {
        &self.package().version
    }

    pub fn human_readable(&self) -> String {
        self.package().human_readable()
    }

    /// Keys this artifact claims ownership of: its own key and its provides
    pub fn owned_keys(&self) -> BTreeSet<String> {
        let package = self.package();
        let mut owned: BTreeSet<String> = package.provides.iter().map(PackageRef::key).collect();
        owned.insert(package.package_name());
        owned
    }
}
