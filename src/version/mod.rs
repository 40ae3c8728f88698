// src/version/mod.rs

//! Version handling and constraint satisfaction for source package versions
//!
//! Versions follow the ports-tree grammar:
//! `[epoch:]N(.N)*[letter](_suffix[N])*[-rN][+build]`
//!
//! Ordering compares, in turn: epoch, the numeric components, the trailing
//! letter, the suffix list (`alpha < beta < pre < rc < (none) < p`), the
//! revision and finally the optional build tag (lexicographically).

use crate::error::{Error, Result};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(\d+):)?(\d+(?:\.\d+)*)([a-z])?((?:_(?:alpha|beta|pre|rc|p)\d*)*)(?:-r(\d+))?(?:\+([A-Za-z0-9._]+))?$",
    )
    .unwrap()
});

static SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(alpha|beta|pre|rc|p)(\d*)").unwrap());

/// Release suffix kinds, declared in ascending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SuffixKind {
    Alpha,
    Beta,
    Pre,
    Rc,
    P,
}

impl SuffixKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "alpha" => Some(Self::Alpha),
            "beta" => Some(Self::Beta),
            "pre" => Some(Self::Pre),
            "rc" => Some(Self::Rc),
            "p" => Some(Self::P),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Alpha => "alpha",
            Self::Beta => "beta",
            Self::Pre => "pre",
            Self::Rc => "rc",
            Self::P => "p",
        }
    }
}

/// A version suffix such as `_rc2`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Suffix {
    pub kind: SuffixKind,
    pub number: String,
}

/// A parsed package version
///
/// Equality follows the version ordering, so `1.0` equals `1.00`.
#[derive(Debug, Clone)]
pub struct PkgVersion {
    pub epoch: String,
    pub numbers: Vec<String>,
    pub letter: Option<char>,
    pub suffixes: Vec<Suffix>,
    pub revision: String,
    pub build: Option<String>,
}

impl PkgVersion {
    /// Parse a version string
    ///
    /// Examples:
    /// - "1.2.3" → numbers=[1,2,3]
    /// - "1.0_rc1-r2" → suffix rc1, revision 2
    /// - "2:5.1b+abi1" → epoch 2, letter b, build tag "abi1"
    pub fn parse(s: &str) -> Result<Self> {
        let caps = VERSION_RE
            .captures(s)
            .ok_or_else(|| Error::VersionError(s.to_string()))?;

        let epoch = caps.get(1).map_or("0", |m| m.as_str()).to_string();
        let numbers = caps[2].split('.').map(str::to_string).collect();
        let letter = caps.get(3).and_then(|m| m.as_str().chars().next());

        let suffixes = match caps.get(4) {
            Some(m) => SUFFIX_RE
                .captures_iter(m.as_str())
                .filter_map(|c| {
                    SuffixKind::parse(&c[1]).map(|kind| Suffix {
                        kind,
                        number: c[2].to_string(),
                    })
                })
                .collect(),
            None => Vec::new(),
        };

        let revision = caps.get(5).map_or("0", |m| m.as_str()).to_string();
        let build = caps.get(6).map(|m| m.as_str().to_string());

        Ok(Self {
            epoch,
            numbers,
            letter,
            suffixes,
            revision,
            build,
        })
    }

    /// Check whether a string is a valid version
    pub fn is_valid(s: &str) -> bool {
        VERSION_RE.is_match(s)
    }

    /// Version without the revision and build tag
    pub fn without_revision(&self) -> Self {
        Self {
            revision: "0".to_string(),
            build: None,
            ..self.clone()
        }
    }

    /// Compare two versions
    pub fn compare(&self, other: &PkgVersion) -> Ordering {
        compare_int(&self.epoch, &other.epoch)
            .then_with(|| self.compare_numbers(other))
            .then_with(|| self.letter.cmp(&other.letter))
            .then_with(|| self.compare_suffixes(other))
            .then_with(|| compare_int(&self.revision, &other.revision))
            .then_with(|| self.build.cmp(&other.build))
    }

    fn compare_numbers(&self, other: &PkgVersion) -> Ordering {
        let first = compare_int(&self.numbers[0], &other.numbers[0]);
        if first != Ordering::Equal {
            return first;
        }

        for (a, b) in self.numbers.iter().zip(&other.numbers).skip(1) {
            let ord = if a.starts_with('0') || b.starts_with('0') {
                a.trim_end_matches('0').cmp(b.trim_end_matches('0'))
            } else {
                compare_int(a, b)
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }

        self.numbers.len().cmp(&other.numbers.len())
    }

    fn compare_suffixes(&self, other: &PkgVersion) -> Ordering {
        for (a, b) in self.suffixes.iter().zip(&other.suffixes) {
            let ord = a
                .kind
                .cmp(&b.kind)
                .then_with(|| compare_int(&a.number, &b.number));
            if ord != Ordering::Equal {
                return ord;
            }
        }

        // An extra suffix sorts above "no suffix" only when it is a patch level
        match self.suffixes.len().cmp(&other.suffixes.len()) {
            Ordering::Greater => suffix_vs_none(&self.suffixes[other.suffixes.len()]),
            Ordering::Less => suffix_vs_none(&other.suffixes[self.suffixes.len()]).reverse(),
            Ordering::Equal => Ordering::Equal,
        }
    }
}

fn suffix_vs_none(suffix: &Suffix) -> Ordering {
    if suffix.kind == SuffixKind::P {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

/// Compare two decimal strings of arbitrary length
fn compare_int(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

impl fmt::Display for PkgVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch != "0" {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.numbers.join("."))?;
        if let Some(letter) = self.letter {
            write!(f, "{}", letter)?;
        }
        for suffix in &self.suffixes {
            write!(f, "_{}{}", suffix.kind.as_str(), suffix.number)?;
        }
        if self.revision != "0" {
            write!(f, "-r{}", self.revision)?;
        }
        if let Some(ref build) = self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

impl PartialEq for PkgVersion {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for PkgVersion {}

impl Ord for PkgVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for PkgVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Version constraint operators used by dependency atoms
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Any version is acceptable
    Any,
    /// Exact version match (`=`)
    Exact(PkgVersion),
    /// Any version starting with the given one (`=1.2*`)
    Prefix(String),
    /// Same version, any revision (`~`)
    AnyRevision(PkgVersion),
    /// Greater than
    GreaterThan(PkgVersion),
    /// Greater than or equal
    GreaterOrEqual(PkgVersion),
    /// Less than
    LessThan(PkgVersion),
    /// Less than or equal
    LessOrEqual(PkgVersion),
}

impl VersionConstraint {
    /// Check if a version satisfies this constraint
    pub fn satisfies(&self, version: &PkgVersion) -> bool {
        match self {
            VersionConstraint::Any => true,
            VersionConstraint::Exact(v) => version == v,
            VersionConstraint::Prefix(prefix) => version.to_string().starts_with(prefix.as_str()),
            VersionConstraint::AnyRevision(v) => {
                version.without_revision() == v.without_revision()
            }
            VersionConstraint::GreaterThan(v) => version > v,
            VersionConstraint::GreaterOrEqual(v) => version >= v,
            VersionConstraint::LessThan(v) => version < v,
            VersionConstraint::LessOrEqual(v) => version <= v,
        }
    }

    /// Exact pin, if this constraint names exactly one version
    pub fn pinned(&self) -> Option<&PkgVersion> {
        match self {
            VersionConstraint::Exact(v) => Some(v),
            _ => None,
        }
    }

    /// Render as a target spec version selector (e.g. ">=1.2")
    pub fn selector(&self) -> String {
        match self {
            VersionConstraint::Any => ">=0".to_string(),
            VersionConstraint::Exact(v) => format!("={}", v),
            VersionConstraint::Prefix(p) => format!("={}*", p),
            VersionConstraint::AnyRevision(v) => format!("~{}", v),
            VersionConstraint::GreaterThan(v) => format!(">{}", v),
            VersionConstraint::GreaterOrEqual(v) => format!(">={}", v),
            VersionConstraint::LessThan(v) => format!("<{}", v),
            VersionConstraint::LessOrEqual(v) => format!("<={}", v),
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Any => write!(f, "*"),
            other => write!(f, "{}", other.selector()),
        }
    }
}
