// tests/common/mod.rs

//! Shared fixtures for integration tests: a source tree and a target tree
//! inside one temporary directory.

#![allow(dead_code)]

use portconv::{ConverterOptions, PackageRef, PackageSpec};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Source tree plus target directory; keep it alive for the whole test
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("tree/metadata/md5-cache")).unwrap();
        Self { dir }
    }

    pub fn tree(&self) -> PathBuf {
        self.dir.path().join("tree")
    }

    pub fn target(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    /// Add a metadata cache record for `category/name-version`
    pub fn package(&self, cpv: &str, fields: &[(&str, &str)]) -> &Self {
        let (category, pv) = cpv.split_once('/').unwrap();
        let dir = self.tree().join("metadata/md5-cache").join(category);
        fs::create_dir_all(&dir).unwrap();

        let mut record = String::from("EAPI=8\nSLOT=0\n");
        for (key, value) in fields {
            record.push_str(&format!("{}={}\n", key, value));
        }
        fs::write(dir.join(pv), record).unwrap();
        self
    }

    /// Write the distfile manifest of `category/name`
    pub fn manifest(&self, key: &str, content: &str) -> &Self {
        let dir = self.tree().join(key);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Manifest"), content).unwrap();
        self
    }

    /// Write a rules document, returning its path
    pub fn rules(&self, content: &str) -> PathBuf {
        self.file("rules.toml", content)
    }

    /// Write an arbitrary file relative to the fixture root
    pub fn file(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    /// Options targeting this fixture, single worker for deterministic order
    pub fn options(&self, packages: &[&str]) -> ConverterOptions {
        let mut options = ConverterOptions::new(self.target());
        options.trees = vec![self.tree()];
        options.packages = packages.iter().map(|p| p.to_string()).collect();
        options.jobs = Some(1);
        options
    }

    /// Directory of one emitted package version
    pub fn emitted(&self, category: &str, name: &str, version: &str) -> PathBuf {
        self.target().join(category).join(name).join(version)
    }

    pub fn definition(&self, category: &str, name: &str, version: &str) -> PackageSpec {
        read_yaml(&self.emitted(category, name, version).join("definition.yaml"))
    }

    pub fn build(&self, category: &str, name: &str, version: &str) -> serde_yaml::Value {
        read_yaml(&self.emitted(category, name, version).join("build.yaml"))
    }
}

pub fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("cannot read {}: {}", path.display(), e));
    serde_yaml::from_str(&content).unwrap()
}

/// `category/name` of every reference
pub fn keys(refs: &[PackageRef]) -> Vec<String> {
    refs.iter().map(|r| r.key()).collect()
}
