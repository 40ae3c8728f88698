// src/source/cache.rs

//! Metadata cache records
//!
//! Each source package version has one pre-computed record under
//! `<root>/metadata/md5-cache/<category>/<name>-<version>`, made of
//! `KEY=VALUE` lines. Only the keys the converter needs are kept.

use super::{depend, IUseFlag, SourcePackage};
use crate::atom::split_name_version;
use crate::error::{Error, Result};
use crate::version::PkgVersion;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Raw `KEY=VALUE` content of one cache file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEntry {
    values: BTreeMap<String, String>,
}

impl CacheEntry {
    /// Parse cache content; `location` names the file in errors
    pub fn parse(content: &str, location: &str) -> Result<Self> {
        let mut values = BTreeMap::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                Error::parse(
                    format!("{}:{}", location, lineno + 1),
                    "expected KEY=VALUE",
                )
            })?;
            values.insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    fn deps(&self, keys: &[&str], location: &str) -> Result<Vec<depend::DepNode>> {
        let mut nodes = Vec::new();
        for key in keys {
            let parsed = depend::parse(self.get_or_empty(key))
                .map_err(|e| Error::parse(format!("{} ({})", location, key), e.to_string()))?;
            nodes.extend(parsed);
        }
        Ok(nodes)
    }
}

fn parse_iuse(value: &str) -> Vec<IUseFlag> {
    value
        .split_whitespace()
        .map(|token| match token.strip_prefix('+') {
            Some(name) => IUseFlag::new(name, true),
            None => IUseFlag::new(token.trim_start_matches('-'), false),
        })
        .collect()
}

/// Read one cache file into a source package
///
/// `root` is the tree root the file belongs to and `category` the name of
/// its parent directory.
pub fn load_package(root: &Path, category: &str, path: &Path) -> Result<SourcePackage> {
    let location = path.display().to_string();
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::parse(&location, "invalid file name"))?;
    let (name, version) = split_name_version(file_name)
        .ok_or_else(|| Error::parse(&location, "file name is not <name>-<version>"))?;
    let version = PkgVersion::parse(version).map_err(|e| Error::parse(&location, e.to_string()))?;

    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let entry = CacheEntry::parse(&content, &location)?;

    let mut package = SourcePackage::new(category, name, version);
    package.root = root.to_path_buf();
    package.cache_path = path.to_path_buf();
    package.eapi = entry.get("EAPI").map(str::to_string);
    package.description = entry.get("DESCRIPTION").map(str::to_string);
    package.license = entry.get("LICENSE").map(str::to_string);
    package.homepage = entry.get("HOMEPAGE").map(str::to_string);
    package.slot = entry.get("SLOT").unwrap_or("0").to_string();
    package.keywords = entry
        .get_or_empty("KEYWORDS")
        .split_whitespace()
        .map(str::to_string)
        .collect();
    package.iuse = parse_iuse(entry.get_or_empty("IUSE"));
    package.build_depends = entry.deps(&["DEPEND", "BDEPEND"], &location)?;
    package.runtime_depends = entry.deps(&["RDEPEND"], &location)?;
    package.post_depends = entry.deps(&["PDEPEND"], &location)?;
    package.src_uri = entry.get_or_empty("SRC_URI").to_string();

    Ok(package)
}
