// src/distfile/mod.rs

//! Distfile manifests
//!
//! A manifest lists the source archives a package downloads, one line per
//! file:
//!
//! ```text
//! DIST foo-1.0.tar.gz 12345 BLAKE2B <hex> SHA512 <hex>
//! ```
//!
//! Lines that are not `DIST` records, are too short to be one, or carry no
//! digest of a supported [`HashAlgorithm`] are skipped. The MD5 of the raw
//! manifest is kept for change detection.
//!
//! `SRC_URI` strings are resolved against the manifest entries to attach
//! the origin URI each local file is downloaded from, honouring the
//! `uri -> local-name` rename syntax.

pub mod reposcan;

pub use reposcan::ReposcanIndex;

use crate::error::{Error, Result};
use crate::hash::{content_md5, HashAlgorithm};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Record marker of distfile lines
const DIST_MARKER: &str = "DIST";

/// Token introducing a rename alias in `SRC_URI`
const ALIAS_ARROW: &str = "->";

/// One downloadable source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistFile {
    /// Local file name
    pub name: String,
    /// Declared size in bytes, kept verbatim
    pub size: String,
    /// Lowercase algorithm name -> hex digest
    #[serde(default)]
    pub hashes: BTreeMap<String, String>,
    /// Origin URIs, filled in by `SRC_URI` resolution
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub src_uri: Vec<String>,
}

impl DistFile {
    pub fn new(name: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: size.into(),
            hashes: BTreeMap::new(),
            src_uri: Vec::new(),
        }
    }

    /// Builder-style helper to attach a digest
    pub fn with_hash(mut self, algorithm: HashAlgorithm, digest: impl Into<String>) -> Self {
        self.hashes.insert(algorithm.name().to_string(), digest.into());
        self
    }
}

/// Parsed distfile manifest of one source package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    /// MD5 of the raw manifest content (empty when built in memory)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub md5: String,
    /// Entries in insertion order
    #[serde(default)]
    pub files: Vec<DistFile>,
    /// Problems met while parsing, one message per skipped line or field
    #[serde(skip)]
    pub warnings: Vec<String>,
}

impl ManifestFile {
    /// Create a manifest from an existing file list
    pub fn new(files: Vec<DistFile>) -> Self {
        Self {
            md5: String::new(),
            files,
            warnings: Vec::new(),
        }
    }

    /// Append entries (duplicates are resolved on write)
    pub fn add_files(&mut self, files: impl IntoIterator<Item = DistFile>) {
        self.files.extend(files);
    }

    /// Parse raw manifest content
    pub fn parse(content: &[u8]) -> Self {
        let mut manifest = ManifestFile {
            md5: content_md5(content),
            ..Default::default()
        };

        let text = String::from_utf8_lossy(content);
        for (lineno, line) in text.lines().enumerate() {
            let words: Vec<&str> = line.split_whitespace().collect();
            if words.first() != Some(&DIST_MARKER) {
                if !words.is_empty() {
                    debug!("Manifest line {}: skipping non-DIST record", lineno + 1);
                }
                continue;
            }
            if words.len() < 4 {
                manifest.warn(format!("line {}: malformed DIST record, skipping", lineno + 1));
                continue;
            }

            let mut file = DistFile::new(words[1], words[2]);
            let pairs = words[3..].chunks_exact(2);
            if !pairs.remainder().is_empty() {
                manifest.warn(format!(
                    "line {}: dangling hash field for {}",
                    lineno + 1,
                    file.name
                ));
            }
            for pair in pairs {
                let name = match pair[0].parse::<HashAlgorithm>() {
                    Ok(algorithm) => algorithm.name().to_string(),
                    Err(e) => {
                        debug!("Manifest line {}: {}, kept verbatim", lineno + 1, e);
                        pair[0].to_lowercase()
                    }
                };
                file.hashes.insert(name, pair[1].to_string());
            }

            if !has_supported_digest(&file) {
                manifest.warn(format!(
                    "line {}: no supported digest for {}, skipping",
                    lineno + 1,
                    file.name
                ));
                continue;
            }
            manifest.files.push(file);
        }

        manifest
    }

    fn warn(&mut self, message: String) {
        warn!("Manifest {}", message);
        self.warnings.push(message);
    }

    /// Parse a manifest from disk; a missing file yields an empty manifest
    pub fn parse_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read(path).map_err(|e| Error::io(path, e))?;
        Ok(Self::parse(&content))
    }

    /// Resolve a `SRC_URI` string into the manifest entries it downloads
    ///
    /// Each returned entry is a copy of the manifest record with `src_uri`
    /// set to the URI that produced it. Names without a manifest record are
    /// dropped, so an empty manifest resolves to nothing.
    pub fn resolve_source_uris(&self, src_uri: &str) -> Vec<DistFile> {
        let mut resolved = Vec::new();
        let mut tokens = src_uri.split_whitespace();
        let mut origin = "";

        while let Some(token) = tokens.next() {
            let local_name = if token == ALIAS_ARROW {
                let Some(alias) = tokens.next() else {
                    break;
                };
                // The origin already produced this name
                if alias == base_name(origin) {
                    continue;
                }
                base_name(alias)
            } else {
                origin = token;
                base_name(token)
            };

            if let Some(file) = self.files.iter().find(|f| f.name == local_name) {
                let mut file = file.clone();
                file.src_uri = vec![origin.to_string()];
                resolved.push(file);
            }
        }

        resolved
    }

    /// Render the manifest text: deduplicated by name, sorted by name
    ///
    /// Only supported algorithms are written; entries without one are left
    /// out, since parsing would drop them anyway.
    pub fn render(&self) -> String {
        let mut seen = HashSet::new();
        let mut unique: Vec<&DistFile> = self
            .files
            .iter()
            .filter(|f| has_supported_digest(f))
            .filter(|f| seen.insert(f.name.as_str()))
            .collect();
        unique.sort_by(|a, b| a.name.cmp(&b.name));

        let mut content = String::new();
        for file in unique {
            let mut fields = vec![DIST_MARKER, file.name.as_str(), file.size.as_str()];
            for algorithm in HashAlgorithm::output_order() {
                if let Some(digest) = file.hashes.get(algorithm.name()) {
                    fields.push(algorithm.manifest_tag());
                    fields.push(digest.as_str());
                }
            }
            content.push_str(&fields.join(" "));
            content.push('\n');
        }
        content
    }

    /// Write the manifest to `path`
    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render()).map_err(|e| Error::io(path, e))
    }
}

fn has_supported_digest(file: &DistFile) -> bool {
    HashAlgorithm::output_order().any(|a| file.hashes.contains_key(a.name()))
}

/// Last path segment of a URI or file name
fn base_name(s: &str) -> &str {
    let trimmed = s.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}
