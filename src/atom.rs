// src/atom.rs

//! Package atoms: `[op]category/name[-version][*][:slot][::repo][[use]]`
//!
//! Atoms name a package, optionally constrained to a version range. They
//! appear in dependency expressions, in the explicit package filter and in
//! the rules document.

use crate::version::{PkgVersion, VersionConstraint};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AtomError {
    #[error("empty atom")]
    Empty,

    #[error("atom '{0}' has no category")]
    MissingCategory(String),

    #[error("atom '{0}' has an operator but no version")]
    MissingVersion(String),

    #[error("invalid atom '{0}'")]
    Invalid(String),
}

/// A package reference with an optional version constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageAtom {
    pub category: String,
    pub name: String,
    pub constraint: VersionConstraint,
    pub slot: Option<String>,
    pub repository: Option<String>,
}

impl PackageAtom {
    /// Atom matching any version of `category/name`
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            constraint: VersionConstraint::Any,
            slot: None,
            repository: None,
        }
    }

    /// Parse an atom string
    pub fn parse(s: &str) -> Result<Self, AtomError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AtomError::Empty);
        }

        let (op, rest) = split_operator(s);

        // USE dependencies are irrelevant for the target tree
        let rest = match rest.find('[') {
            Some(pos) if rest.ends_with(']') => &rest[..pos],
            Some(_) => return Err(AtomError::Invalid(s.to_string())),
            None => rest,
        };

        let (rest, repository) = match rest.split_once("::") {
            Some((r, repo)) => (r, Some(repo.to_string())),
            None => (rest, None),
        };

        let (rest, slot) = match rest.split_once(':') {
            Some((r, slot)) => (r, Some(slot.to_string())),
            None => (rest, None),
        };

        let (category, pn_ver) = rest
            .split_once('/')
            .ok_or_else(|| AtomError::MissingCategory(s.to_string()))?;
        if category.is_empty() || pn_ver.is_empty() || pn_ver.contains('/') {
            return Err(AtomError::Invalid(s.to_string()));
        }

        let (name, constraint) = match op {
            None => (pn_ver, VersionConstraint::Any),
            Some(op) => {
                let glob = pn_ver.ends_with('*');
                let (name, version) = split_name_version(pn_ver.trim_end_matches('*'))
                    .ok_or_else(|| AtomError::MissingVersion(s.to_string()))?;
                let parsed = PkgVersion::parse(version)
                    .map_err(|_| AtomError::Invalid(s.to_string()))?;
                let constraint = match (op, glob) {
                    ("=", true) => VersionConstraint::Prefix(version.to_string()),
                    (_, true) => return Err(AtomError::Invalid(s.to_string())),
                    ("=", false) => VersionConstraint::Exact(parsed),
                    ("~", false) => VersionConstraint::AnyRevision(parsed),
                    (">=", false) => VersionConstraint::GreaterOrEqual(parsed),
                    ("<=", false) => VersionConstraint::LessOrEqual(parsed),
                    (">", false) => VersionConstraint::GreaterThan(parsed),
                    ("<", false) => VersionConstraint::LessThan(parsed),
                    _ => return Err(AtomError::Invalid(s.to_string())),
                };
                (name, constraint)
            }
        };

        Ok(Self {
            category: category.to_string(),
            name: name.to_string(),
            constraint,
            slot,
            repository,
        })
    }

    /// Package key (`category/name`) shared by all versions
    pub fn key(&self) -> String {
        format!("{}/{}", self.category, self.name)
    }

    /// Check whether a concrete package matches this atom
    pub fn matches(&self, category: &str, name: &str, version: &PkgVersion) -> bool {
        self.category == category && self.name == name && self.constraint.satisfies(version)
    }
}

impl fmt::Display for PackageAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            VersionConstraint::Any => write!(f, "{}/{}", self.category, self.name)?,
            VersionConstraint::Prefix(p) => write!(f, "={}/{}-{}*", self.category, self.name, p)?,
            c => {
                let sel = c.selector();
                let op_len = sel.len() - sel.trim_start_matches(['<', '>', '=', '~']).len();
                write!(
                    f,
                    "{}{}/{}-{}",
                    &sel[..op_len],
                    self.category,
                    self.name,
                    &sel[op_len..]
                )?
            }
        }
        if let Some(ref slot) = self.slot {
            write!(f, ":{}", slot)?;
        }
        Ok(())
    }
}

fn split_operator(s: &str) -> (Option<&'static str>, &str) {
    for op in [">=", "<=", "=", "~", ">", "<"] {
        if let Some(rest) = s.strip_prefix(op) {
            return (Some(op), rest);
        }
    }
    (None, s)
}

/// Split `name-version` at the first hyphen followed by a valid version
pub fn split_name_version(pn_ver: &str) -> Option<(&str, &str)> {
    pn_ver
        .match_indices('-')
        .map(|(idx, _)| (&pn_ver[..idx], &pn_ver[idx + 1..]))
        .find(|(name, version)| !name.is_empty() && PkgVersion::is_valid(version))
}
