// src/source/mod.rs

//! Source tree model
//!
//! A [`SourcePackage`] is one package version read from a source tree's
//! metadata cache. Packages are immutable once loaded and shared through
//! the [`TreeIndex`].

pub mod cache;
pub mod depend;
pub mod tree;

pub use depend::{DepChoice, DepNode, DepSet, UseSet};
pub use tree::{TreeIndex, TreeLoader};

use crate::version::PkgVersion;
use std::collections::BTreeMap;
use std::path::PathBuf;
use strum_macros::{Display, EnumIter};

/// Relation kind of a dependency expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum DepKind {
    /// `DEPEND` and `BDEPEND`
    Build,
    /// `RDEPEND`
    Runtime,
    /// `PDEPEND`
    Post,
}

/// An `IUSE` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IUseFlag {
    pub name: String,
    pub default_enabled: bool,
}

impl IUseFlag {
    pub fn new(name: impl Into<String>, default_enabled: bool) -> Self {
        Self {
            name: name.into(),
            default_enabled,
        }
    }
}

/// One package version of a source tree
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePackage {
    pub category: String,
    pub name: String,
    pub version: PkgVersion,
    pub slot: String,
    pub eapi: Option<String>,
    pub description: Option<String>,
    pub license: Option<String>,
    pub homepage: Option<String>,
    pub keywords: Vec<String>,
    pub iuse: Vec<IUseFlag>,
    pub build_depends: Vec<DepNode>,
    pub runtime_depends: Vec<DepNode>,
    pub post_depends: Vec<DepNode>,
    /// Raw `SRC_URI`, conditionals included
    pub src_uri: String,
    pub annotations: BTreeMap<String, serde_json::Value>,
    /// Tree root this package was loaded from
    pub root: PathBuf,
    pub cache_path: PathBuf,
}

impl SourcePackage {
    pub fn new(category: impl Into<String>, name: impl Into<String>, version: PkgVersion) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            version,
            slot: "0".to_string(),
            eapi: None,
            description: None,
            license: None,
            homepage: None,
            keywords: Vec::new(),
            iuse: Vec::new(),
            build_depends: Vec::new(),
            runtime_depends: Vec::new(),
            post_depends: Vec::new(),
            src_uri: String::new(),
            annotations: BTreeMap::new(),
            root: PathBuf::new(),
            cache_path: PathBuf::new(),
        }
    }

    /// `category/name`
    pub fn key(&self) -> String {
        format!("{}/{}", self.category, self.name)
    }

    /// `category/name-version`
    pub fn atom(&self) -> String {
        format!("{}/{}-{}", self.category, self.name, self.version)
    }

    pub fn dependencies(&self, kind: DepKind) -> &[DepNode] {
        match kind {
            DepKind::Build => &self.build_depends,
            DepKind::Runtime => &self.runtime_depends,
            DepKind::Post => &self.post_depends,
        }
    }

    /// Distfile manifest shared by every version of this package
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(&self.category).join(&self.name).join("Manifest")
    }

    /// Enabled flags: IUSE defaults plus `forced`, minus `disabled`
    pub fn enabled_use<'a, I, J>(&self, forced: I, disabled: J) -> UseSet
    where
        I: IntoIterator<Item = &'a String>,
        J: IntoIterator<Item = &'a String>,
    {
        let mut enabled: UseSet = self
            .iuse
            .iter()
            .filter(|f| f.default_enabled)
            .map(|f| f.name.clone())
            .collect();
        enabled.extend(forced.into_iter().cloned());
        for flag in disabled {
            enabled.remove(flag);
        }
        enabled
    }
}
