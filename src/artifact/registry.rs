// src/artifact/registry.rs

//! Versioned artifact registry
//!
//! [`ArtifactsMap`] indexes every artifact seen during one run by identity
//! key, one entry per distinct version. [`ArtifactRegistry`] wraps it in a
//! lock so parallel workers can add and look up artifacts safely.

use super::conflicts::find_overlaps;
use super::{GeneratedArtifact, PackageRef};
use crate::error::{Error, Result};
use crate::version::PkgVersion;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Descending version order
///
/// Unparsable versions sort after every parsable one, in descending string
/// order among themselves.
fn compare_desc(a: &GeneratedArtifact, b: &GeneratedArtifact) -> Ordering {
    match (PkgVersion::parse(a.version()), PkgVersion::parse(b.version())) {
        (Ok(va), Ok(vb)) => vb.cmp(&va),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => b.version().cmp(a.version()),
    }
}

/// Identity key -> artifacts, one per version
#[derive(Debug, Clone, Default)]
pub struct ArtifactsMap {
    artifacts: BTreeMap<String, Vec<Arc<GeneratedArtifact>>>,
}

impl ArtifactsMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an artifact under its identity key
    ///
    /// An existing entry for the same version is never replaced; returns
    /// false in that case.
    pub fn add(&mut self, artifact: Arc<GeneratedArtifact>) -> bool {
        let entries = self.artifacts.entry(artifact.key()).or_default();
        if entries.iter().any(|a| a.version() == artifact.version()) {
            debug!("{} already registered", artifact.human_readable());
            return false;
        }
        entries.push(artifact);
        true
    }

    /// Drop the entry for `key` at exactly `version`
    pub fn remove(&mut self, key: &str, version: &str) -> Option<Arc<GeneratedArtifact>> {
        let entries = self.artifacts.get_mut(key)?;
        let index = entries.iter().position(|a| a.version() == version)?;
        let removed = entries.remove(index);
        if entries.is_empty() {
            self.artifacts.remove(key);
        }
        Some(removed)
    }

    /// Entry with the same identity key and version as `artifact`
    pub fn match_version(&self, artifact: &GeneratedArtifact) -> Result<Arc<GeneratedArtifact>> {
        self.get_version(&artifact.key(), artifact.version())
    }

    /// Entry for `key` at exactly `version`
    pub fn get_version(&self, key: &str, version: &str) -> Result<Arc<GeneratedArtifact>> {
        self.artifacts
            .get(key)
            .and_then(|entries| entries.iter().find(|a| a.version() == version))
            .cloned()
            .ok_or_else(|| Error::NotFoundError(format!("Package {}-{} not found", key, version)))
    }

    pub fn get_by_key(&self, key: &str) -> Result<&[Arc<GeneratedArtifact>]> {
        self.artifacts
            .get(key)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::NotFoundError(format!("Package {} not found on map", key)))
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.artifacts.contains_key(key)
    }

    /// Artifacts of `key`, highest version first
    pub fn get_sorted_by_key(&self, key: &str) -> Result<Vec<Arc<GeneratedArtifact>>> {
        let mut entries = self.get_by_key(key)?.to_vec();
        if entries.len() > 1 {
            entries.sort_by(|a, b| compare_desc(a, b));
        }
        Ok(entries)
    }

    /// Identity key under which this exact artifact is stored
    pub fn get_key_from_value(&self, artifact: &GeneratedArtifact) -> Option<String> {
        self.artifacts
            .iter()
            .find(|(_, entries)| entries.iter().any(|a| a.as_ref() == artifact))
            .map(|(key, _)| key.clone())
    }

    /// All artifacts of every key that has a version providing `key`
    pub fn get_provides(&self, key: &str) -> Vec<Arc<GeneratedArtifact>> {
        self.artifacts
            .values()
            .filter(|entries| entries.iter().any(|a| a.package().provides_key(key)))
            .flat_map(|entries| entries.iter().cloned())
            .collect()
    }

    pub fn to_list(&self) -> Vec<Arc<GeneratedArtifact>> {
        self.artifacts.values().flatten().cloned().collect()
    }

    pub fn to_map(&self) -> BTreeMap<String, Vec<Arc<GeneratedArtifact>>> {
        self.artifacts.clone()
    }

    pub fn to_pack(&self) -> ArtifactsPack {
        ArtifactsPack {
            artifacts: self.to_list(),
        }
    }

    pub fn len(&self) -> usize {
        self.artifacts.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Record a conflict on the stored entry `key`/`version`
    fn record_conflict(&mut self, key: &str, version: &str, conflict: &PackageRef) -> bool {
        let Some(entry) = self
            .artifacts
            .get_mut(key)
            .and_then(|entries| entries.iter_mut().find(|a| a.version() == version))
        else {
            return false;
        };
        Arc::make_mut(entry).package_mut().add_conflict(conflict.clone())
    }
}

/// Flat list of artifacts
#[derive(Debug, Clone, Default)]
pub struct ArtifactsPack {
    pub artifacts: Vec<Arc<GeneratedArtifact>>,
}

impl ArtifactsPack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_map(&self) -> ArtifactsMap {
        let mut map = ArtifactsMap::new();
        for artifact in &self.artifacts {
            map.add(Arc::clone(artifact));
        }
        map
    }

    /// Whether any artifact shares the package name of `artifact`
    pub fn is_present(&self, artifact: &GeneratedArtifact) -> bool {
        let name = artifact.key();
        self.artifacts.iter().any(|a| a.key() == name)
    }
}

/// Outcome of [`ArtifactRegistry::register`]
#[derive(Debug, Clone)]
pub struct Registration {
    /// The stored entry
    pub artifact: Arc<GeneratedArtifact>,
    /// Whether this call inserted it
    pub inserted: bool,
    /// Existing entries (`key`, `version`) that gained a conflict
    pub touched: Vec<(String, String)>,
}

/// Registry shared by the conversion workers
#[derive(Debug, Default)]
pub struct ArtifactRegistry {
    inner: RwLock<ArtifactsMap>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `artifact` unless its version is already present
    ///
    /// With `detect_conflicts`, ownership overlaps with every registered
    /// artifact are recorded on both sides before insertion. Detection and
    /// insertion happen under one write lock, so two concurrent
    /// registrations always see each other.
    pub fn register(&self, mut artifact: GeneratedArtifact, detect_conflicts: bool) -> Registration {
        let mut map = self.inner.write();
        if let Ok(existing) = map.match_version(&artifact) {
            return Registration {
                artifact: existing,
                inserted: false,
                touched: Vec::new(),
            };
        }

        let mut touched = Vec::new();
        if detect_conflicts {
            let overlaps = find_overlaps(&artifact, map.artifacts.values().flatten().map(Arc::as_ref));
            let own = artifact.package().to_ref();
            for overlap in overlaps {
                debug!(
                    "{} conflicts with {} on {:?}",
                    artifact.human_readable(),
                    overlap.identity,
                    overlap.shared
                );
                artifact.package_mut().add_conflict(overlap.identity);
                if map.record_conflict(&overlap.key, &overlap.version, &own) {
                    touched.push((overlap.key, overlap.version));
                }
            }
        }

        let artifact = Arc::new(artifact);
        map.add(Arc::clone(&artifact));
        Registration {
            artifact,
            inserted: true,
            touched,
        }
    }

    /// Register `artifact` without conflict detection
    pub fn add_if_absent(&self, artifact: GeneratedArtifact) -> (Arc<GeneratedArtifact>, bool) {
        let registration = self.register(artifact, false);
        (registration.artifact, registration.inserted)
    }

    pub fn match_version(&self, artifact: &GeneratedArtifact) -> Result<Arc<GeneratedArtifact>> {
        self.inner.read().match_version(artifact)
    }

    pub fn get_version(&self, key: &str, version: &str) -> Result<Arc<GeneratedArtifact>> {
        self.inner.read().get_version(key, version)
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.inner.read().has_key(key)
    }

    pub fn get_sorted_by_key(&self, key: &str) -> Result<Vec<Arc<GeneratedArtifact>>> {
        self.inner.read().get_sorted_by_key(key)
    }

    pub fn get_provides(&self, key: &str) -> Vec<Arc<GeneratedArtifact>> {
        self.inner.read().get_provides(key)
    }

    /// Consistent copy of every registered artifact
    pub fn snapshot(&self) -> Vec<Arc<GeneratedArtifact>> {
        self.inner.read().to_list()
    }

    /// Consistent copy of the whole map
    pub fn to_map(&self) -> ArtifactsMap {
        self.inner.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Withdraw a registration whose emission failed
    pub fn remove(&self, key: &str, version: &str) -> Option<Arc<GeneratedArtifact>> {
        self.inner.write().remove(key, version)
    }

    /// Add `conflict` to the registered artifact `key`/`version`
    ///
    /// Returns true when the artifact did not declare it yet.
    pub fn record_conflict(&self, key: &str, version: &str, conflict: &PackageRef) -> bool {
        self.inner.write().record_conflict(key, version, conflict)
    }
}
