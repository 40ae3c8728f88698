// src/artifact/conflicts.rs

//! Ownership conflicts between artifacts
//!
//! Two artifacts conflict when they claim ownership of a common key. An
//! artifact owns its identity key and every key it declares in `provides`.
//! Versions of the same package never conflict with each other.

use super::{GeneratedArtifact, PackageRef};

/// An existing artifact that shares ownership with a candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlap {
    /// Identity key of the existing artifact
    pub key: String,
    pub version: String,
    /// Reference to declare as a conflict on the candidate
    pub identity: PackageRef,
    /// Keys owned by both
    pub shared: Vec<String>,
}

/// Existing artifacts whose ownership overlaps `candidate`'s
pub fn find_overlaps<'a, I>(candidate: &GeneratedArtifact, existing: I) -> Vec<Overlap>
where
    I: IntoIterator<Item = &'a GeneratedArtifact>,
{
    let candidate_key = candidate.key();
    let owned = candidate.owned_keys();

    existing
        .into_iter()
        .filter(|other| other.key() != candidate_key)
        .filter_map(|other| {
            let shared: Vec<String> = other.owned_keys().intersection(&owned).cloned().collect();
            if shared.is_empty() {
                return None;
            }
            Some(Overlap {
                key: other.key(),
                version: other.version().to_string(),
                identity: other.package().to_ref(),
                shared,
            })
        })
        .collect()
}
