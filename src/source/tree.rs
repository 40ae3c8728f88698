// src/source/tree.rs

//! Source tree loading
//!
//! Every root is scanned independently (in parallel) and the results are
//! merged in root order into one immutable [`TreeIndex`]. A later root
//! replaces the record an earlier root gave for the same package version.

use super::{cache, SourcePackage};
use crate::atom::PackageAtom;
use crate::error::{Error, Result};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Metadata cache location relative to a tree root
pub const CACHE_DIR: &str = "metadata/md5-cache";

/// All source packages known to a run, by `category/name`
#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    roots: Vec<PathBuf>,
    /// Versions of each key, highest first
    packages: HashMap<String, Vec<Arc<SourcePackage>>>,
}

impl TreeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a package, replacing an existing record of the same version
    pub fn insert(&mut self, package: SourcePackage) {
        let versions = self.packages.entry(package.key()).or_default();
        match versions.iter_mut().find(|p| p.version == package.version) {
            Some(existing) => {
                debug!(
                    "{} from {} overrides {}",
                    package.atom(),
                    package.root.display(),
                    existing.root.display()
                );
                *existing = Arc::new(package);
            }
            None => {
                versions.push(Arc::new(package));
                versions.sort_by(|a, b| b.version.cmp(&a.version));
            }
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Versions of `key`, highest first
    pub fn versions(&self, key: &str) -> &[Arc<SourcePackage>] {
        self.packages.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.packages.contains_key(key)
    }

    /// Highest version matching `atom`
    pub fn best_match(&self, atom: &PackageAtom) -> Option<Arc<SourcePackage>> {
        self.versions(&atom.key())
            .iter()
            .find(|p| atom.constraint.satisfies(&p.version))
            .cloned()
    }

    /// Every package version, ordered by key then descending version
    pub fn all(&self) -> Vec<Arc<SourcePackage>> {
        let mut keys: Vec<&String> = self.packages.keys().collect();
        keys.sort();
        keys.into_iter()
            .flat_map(|k| self.packages[k].iter().cloned())
            .collect()
    }

    /// Number of package versions
    pub fn len(&self) -> usize {
        self.packages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Scans source tree roots into a [`TreeIndex`]
#[derive(Debug, Clone)]
pub struct TreeLoader {
    roots: Vec<PathBuf>,
}

impl TreeLoader {
    pub fn new<P: AsRef<Path>>(roots: &[P]) -> Self {
        Self {
            roots: roots.iter().map(|r| r.as_ref().to_path_buf()).collect(),
        }
    }

    /// Load every root; any unreadable root or record aborts the load
    pub fn load(&self) -> Result<TreeIndex> {
        let scanned: Vec<Vec<SourcePackage>> = self
            .roots
            .par_iter()
            .map(|root| scan_root(root))
            .collect::<Result<_>>()?;

        let mut index = TreeIndex::new();
        index.roots = self.roots.clone();
        for packages in scanned {
            for package in packages {
                index.insert(package);
            }
        }

        info!(
            "Loaded {} package versions from {} tree(s)",
            index.len(),
            self.roots.len()
        );
        Ok(index)
    }
}

fn scan_root(root: &Path) -> Result<Vec<SourcePackage>> {
    if !root.is_dir() {
        return Err(Error::NotFoundError(format!(
            "Source tree {} not found",
            root.display()
        )));
    }
    let cache_dir = root.join(CACHE_DIR);
    if !cache_dir.is_dir() {
        return Err(Error::NotFoundError(format!(
            "Source tree {} has no {}",
            root.display(),
            CACHE_DIR
        )));
    }

    let mut packages = Vec::new();
    for entry in WalkDir::new(&cache_dir).min_depth(2).max_depth(2).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(&cache_dir).to_path_buf();
            Error::io(path, e.into())
        })?;
        if !entry.file_type().is_file() || entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let category = entry
            .path()
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::parse(entry.path().display().to_string(), "invalid category"))?;

        packages.push(cache::load_package(root, category, entry.path())?);
    }

    debug!("Scanned {} records in {}", packages.len(), root.display());
    Ok(packages)
}
