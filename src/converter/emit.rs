// src/converter/emit.rs

//! Target tree emission
//!
//! Each artifact version lands in `<to>/<category>/<name>/<version>/`:
//!
//! - `Manifest`: distfiles, only when any were resolved
//! - `finalize.yaml`: only when the finalizer has steps
//! - `definition.yaml`: runtime spec (or compile identity)
//! - `build.yaml`: compile spec, source atom and archive configuration
//!
//! `build.yaml` is written last; its presence marks a complete emission.

use crate::artifact::{GeneratedArtifact, PackageSpec};
use crate::distfile::ManifestFile;
use crate::error::{Error, Result};
use crate::subsets::ArchiveSpec;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

pub const MANIFEST_FILE: &str = "Manifest";
pub const FINALIZE_FILE: &str = "finalize.yaml";
pub const DEFINITION_FILE: &str = "definition.yaml";
pub const BUILD_FILE: &str = "build.yaml";

/// Contents of `build.yaml`
#[derive(Debug, Serialize)]
struct BuildFile<'a> {
    #[serde(flatten)]
    package: &'a PackageSpec,
    source: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    manifest_md5: Option<&'a str>,
    archive: &'a ArchiveSpec,
}

/// Destination of generated specs
pub trait SpecWriter: Send + Sync {
    /// Whether a complete emission exists for this identity
    fn exists(&self, category: &str, name: &str, version: &str) -> bool;

    /// Definition of an existing emission
    fn load_definition(&self, category: &str, name: &str, version: &str)
    -> Result<Option<PackageSpec>>;

    /// Emit every file of `artifact`, returning its directory
    fn write(&self, artifact: &GeneratedArtifact, archive: &ArchiveSpec) -> Result<PathBuf>;

    /// Rewrite only `definition.yaml`
    fn write_definition(&self, artifact: &GeneratedArtifact) -> Result<()>;
}

/// Writes specs under a target tree root
#[derive(Debug, Clone)]
pub struct FsSpecWriter {
    root: PathBuf,
}

impl FsSpecWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one package version
    pub fn package_dir(&self, category: &str, name: &str, version: &str) -> PathBuf {
        self.root.join(category).join(name).join(version)
    }

    fn artifact_dir(&self, artifact: &GeneratedArtifact) -> PathBuf {
        let package = artifact.package();
        self.package_dir(&package.category, &package.name, &package.version)
    }
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_yaml::to_string(value)?;
    fs::write(path, data).map_err(|e| Error::io(path, e))
}

/// Remove a file left over by a previous emission
fn remove_stale(path: &Path) -> Result<()> {
    if path.exists() {
        debug!("Removing stale {}", path.display());
        fs::remove_file(path).map_err(|e| Error::io(path, e))?;
    }
    Ok(())
}

impl SpecWriter for FsSpecWriter {
    fn exists(&self, category: &str, name: &str, version: &str) -> bool {
        self.package_dir(category, name, version).join(BUILD_FILE).is_file()
    }

    fn load_definition(
        &self,
        category: &str,
        name: &str,
        version: &str,
    ) -> Result<Option<PackageSpec>> {
        if !self.exists(category, name, version) {
            return Ok(None);
        }
        let path = self.package_dir(category, name, version).join(DEFINITION_FILE);
        let content = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        let spec = serde_yaml::from_str(&content)
            .map_err(|e| Error::parse(path.display().to_string(), e.to_string()))?;
        Ok(Some(spec))
    }

    fn write(&self, artifact: &GeneratedArtifact, archive: &ArchiveSpec) -> Result<PathBuf> {
        let dir = self.artifact_dir(artifact);
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;

        let manifest_path = dir.join(MANIFEST_FILE);
        if artifact.files.is_empty() {
            remove_stale(&manifest_path)?;
        } else {
            ManifestFile::new(artifact.files.clone()).write(&manifest_path)?;
        }

        let finalize_path = dir.join(FINALIZE_FILE);
        match artifact.finalizer.as_ref().filter(|f| f.is_valid()) {
            Some(finalizer) => finalizer.write(&finalize_path)?,
            None => remove_stale(&finalize_path)?,
        }

        write_yaml(&dir.join(DEFINITION_FILE), artifact.package())?;

        let build = BuildFile {
            package: &artifact.compile,
            source: &artifact.source,
            manifest_md5: Some(artifact.manifest_md5.as_str()).filter(|m| !m.is_empty()),
            archive,
        };
        write_yaml(&dir.join(BUILD_FILE), &build)?;

        info!("Generated {}", artifact.human_readable());
        Ok(dir)
    }

    fn write_definition(&self, artifact: &GeneratedArtifact) -> Result<()> {
        let dir = self.artifact_dir(artifact);
        write_yaml(&dir.join(DEFINITION_FILE), artifact.package())
    }
}

/// Package keys already declared by an existing target tree
#[derive(Debug, Clone, Default)]
pub struct LayerIndex {
    keys: HashSet<String>,
}

impl LayerIndex {
    /// Index every `definition.yaml` below `root`
    ///
    /// A missing root is an empty layer. Each definition contributes its
    /// own key and its provides.
    pub fn scan(root: &Path) -> Result<Self> {
        let mut index = Self::default();
        if !root.is_dir() {
            return Ok(index);
        }

        for entry in WalkDir::new(root).min_depth(4).max_depth(4) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                Error::io(path, e.into())
            })?;
            if entry.file_name() != DEFINITION_FILE {
                continue;
            }
            let content = fs::read_to_string(entry.path()).map_err(|e| Error::io(entry.path(), e))?;
            let spec: PackageSpec = serde_yaml::from_str(&content)
                .map_err(|e| Error::parse(entry.path().display().to_string(), e.to_string()))?;
            index.keys.insert(spec.package_name());
            index.keys.extend(spec.provides.iter().map(|p| p.key()));
        }

        info!("Layer {} declares {} packages", root.display(), index.keys.len());
        Ok(index)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::PackageRef;
    use crate::distfile::DistFile;
    use crate::finalizer::Finalizer;
    use crate::hash::HashAlgorithm;
    use crate::subsets::{ArchiveConfig, SubsetsDefinition};

    fn sample() -> GeneratedArtifact {
        let mut compile = PackageSpec::new("dev-libs", "foo", "1.0");
        compile.requires.push(PackageRef::new("dev-util", "cmake", ">=3"));
        let mut artifact = GeneratedArtifact::new(compile, "dev-libs/foo-1.0");
        let mut runtime = PackageSpec::new("dev-libs", "foo", "1.0");
        runtime.requires.push(PackageRef::new("sys-libs", "zlib", ">=0"));
        artifact.runtime = Some(runtime);
        artifact.files = vec![DistFile::new("foo-1.0.tar.gz", "10").with_hash(HashAlgorithm::Sha512, "abc")];
        artifact.finalizer = Some(Finalizer::new(vec!["ldconfig".to_string()]));
        artifact
    }

    fn archive() -> ArchiveSpec {
        SubsetsDefinition::new().archive_spec(&[], &ArchiveConfig::default())
    }

    #[test]
    fn test_write_layout() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FsSpecWriter::new(dir.path());
        assert!(!writer.exists("dev-libs", "foo", "1.0"));

        let out = writer.write(&sample(), &archive()).unwrap();
        assert_eq!(out, dir.path().join("dev-libs/foo/1.0"));
        for file in [MANIFEST_FILE, FINALIZE_FILE, DEFINITION_FILE, BUILD_FILE] {
            assert!(out.join(file).is_file(), "{} missing", file);
        }
        assert!(writer.exists("dev-libs", "foo", "1.0"));

        let manifest = fs::read_to_string(out.join(MANIFEST_FILE)).unwrap();
        assert_eq!(manifest, "DIST foo-1.0.tar.gz 10 SHA512 abc\n");

        let build = fs::read_to_string(out.join(BUILD_FILE)).unwrap();
        assert!(build.contains("cmake"));
        assert!(build.contains("source: dev-libs/foo-1.0"));
        assert!(build.contains("archive:"));

        let definition = writer.load_definition("dev-libs", "foo", "1.0").unwrap().unwrap();
        assert_eq!(definition.requires[0].key(), "sys-libs/zlib");
    }

    #[test]
    fn test_rewrite_removes_stale_optional_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FsSpecWriter::new(dir.path());
        let out = writer.write(&sample(), &archive()).unwrap();

        let mut bare = sample();
        bare.files.clear();
        bare.finalizer = None;
        writer.write(&bare, &archive()).unwrap();
        assert!(!out.join(MANIFEST_FILE).exists());
        assert!(!out.join(FINALIZE_FILE).exists());
    }

    #[test]
    fn test_write_definition_only() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FsSpecWriter::new(dir.path());
        let mut artifact = sample();
        writer.write(&artifact, &archive()).unwrap();

        artifact
            .package_mut()
            .add_conflict(PackageRef::new("dev-libs", "bar", ">=0"));
        writer.write_definition(&artifact).unwrap();

        let definition = writer.load_definition("dev-libs", "foo", "1.0").unwrap().unwrap();
        assert_eq!(definition.conflicts[0].key(), "dev-libs/bar");
    }

    #[test]
    fn test_layer_scan() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FsSpecWriter::new(dir.path());
        let mut artifact = sample();
        artifact
            .package_mut()
            .provides
            .push(PackageRef::new("virtual", "foo", ">=0"));
        writer.write(&artifact, &archive()).unwrap();

        let layer = LayerIndex::scan(dir.path()).unwrap();
        assert!(layer.contains("dev-libs/foo"));
        assert!(layer.contains("virtual/foo"));
        assert!(!layer.contains("sys-libs/zlib"));

        assert!(LayerIndex::scan(&dir.path().join("missing")).unwrap().is_empty());
    }
}
