// src/distfile/reposcan.rs

//! Reposcan metadata sources
//!
//! A reposcan source is a JSON document produced by an external metadata
//! scanner. Only the distfile list of each atom is consumed here:
//!
//! ```json
//! { "cache": { "dev-libs/foo-1.0": { "files": [
//!     { "name": "foo-1.0.tar.gz", "size": "123",
//!       "hashes": { "sha512": "..." }, "src_uri": ["https://..."] }
//! ] } } }
//! ```
//!
//! Sources are registered append-only; a later source overrides the file
//! list an earlier one gave for the same atom.

use super::DistFile;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct ReposcanDocument {
    #[serde(default)]
    cache: HashMap<String, ReposcanAtom>,
}

#[derive(Debug, Deserialize)]
struct ReposcanAtom {
    #[serde(default)]
    files: Vec<DistFile>,
}

/// Distfile metadata merged from all reposcan sources
#[derive(Debug, Default, Clone)]
pub struct ReposcanIndex {
    sources: Vec<PathBuf>,
    files: HashMap<String, Vec<DistFile>>,
}

impl ReposcanIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every source in order
    pub fn load<P: AsRef<Path>>(sources: &[P]) -> Result<Self> {
        let mut index = Self::new();
        for source in sources {
            index.add_source(source.as_ref())?;
        }
        Ok(index)
    }

    /// Register one more source and merge its atoms
    pub fn add_source(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(Error::NotFoundError(format!(
                "Reposcan source {} not found",
                path.display()
            )));
        }

        let content = fs::read(path).map_err(|e| Error::io(path, e))?;
        let doc: ReposcanDocument = serde_json::from_slice(&content)
            .map_err(|e| Error::parse(path.display().to_string(), e.to_string()))?;

        info!(
            "Loaded reposcan source {} ({} atoms)",
            path.display(),
            doc.cache.len()
        );

        for (atom, entry) in doc.cache {
            if self.files.insert(atom.clone(), entry.files).is_some() {
                debug!("Reposcan atom {} overridden by {}", atom, path.display());
            }
        }
        self.sources.push(path.to_path_buf());
        Ok(())
    }

    /// Registered sources, in registration order
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Distfiles known for `category/name-version`
    pub fn files(&self, atom: &str) -> Option<&[DistFile]> {
        self.files.get(atom).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
