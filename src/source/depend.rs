// src/source/depend.rs

//! Dependency expressions
//!
//! Parses `DEPEND`-style strings into a tree of [`DepNode`]s and evaluates
//! them against a package's enabled USE flags:
//!
//! ```text
//! dev-libs/a >=dev-libs/b-1.2 ssl? ( dev-libs/openssl ) || ( a/x a/y ) !a/old
//! ```

use crate::atom::{AtomError, PackageAtom};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Enabled USE flags of one package
pub type UseSet = BTreeSet<String>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DependError {
    #[error("unbalanced ')'")]
    UnbalancedClose,

    #[error("unclosed '('")]
    Unclosed,

    #[error("expected '(' after '{0}'")]
    ExpectedGroup(String),

    #[error(transparent)]
    Atom(#[from] AtomError),
}

/// One node of a dependency expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepNode {
    Atom(PackageAtom),
    /// `!atom` (weak) or `!!atom` (strong)
    Blocker { atom: PackageAtom, strong: bool },
    /// `|| ( ... )`: the first satisfiable child wins
    AnyOf(Vec<DepNode>),
    /// `flag? ( ... )` or `!flag? ( ... )`
    Conditional {
        flag: String,
        negated: bool,
        children: Vec<DepNode>,
    },
    /// `( ... )`
    Group(Vec<DepNode>),
}

/// A dependency left after USE conditionals are evaluated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepChoice {
    One(PackageAtom),
    /// Alternatives in preference order; each must resolve entirely
    AnyOf(Vec<Vec<DepChoice>>),
}

impl fmt::Display for DepChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepChoice::One(atom) => write!(f, "{}", atom),
            DepChoice::AnyOf(alternatives) => {
                write!(f, "|| (")?;
                for alt in alternatives {
                    for choice in alt {
                        write!(f, " {}", choice)?;
                    }
                }
                write!(f, " )")
            }
        }
    }
}

/// Evaluated dependency expression
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepSet {
    pub requires: Vec<DepChoice>,
    pub blockers: Vec<PackageAtom>,
}

impl DepSet {
    pub fn is_empty(&self) -> bool {
        self.requires.is_empty() && self.blockers.is_empty()
    }
}

/// Parse a dependency string
pub fn parse(input: &str) -> Result<Vec<DepNode>, DependError> {
    let mut tokens = input.split_whitespace();
    parse_seq(&mut tokens, false)
}

fn parse_seq<'a, I>(tokens: &mut I, nested: bool) -> Result<Vec<DepNode>, DependError>
where
    I: Iterator<Item = &'a str>,
{
    let mut nodes = Vec::new();

    while let Some(token) = tokens.next() {
        let node = match token {
            ")" if nested => return Ok(nodes),
            ")" => return Err(DependError::UnbalancedClose),
            "(" => DepNode::Group(parse_seq(tokens, true)?),
            "||" => {
                expect_open(tokens, token)?;
                DepNode::AnyOf(parse_seq(tokens, true)?)
            }
            t if t.ends_with('?') => {
                expect_open(tokens, token)?;
                let flag = t.trim_end_matches('?');
                let (flag, negated) = match flag.strip_prefix('!') {
                    Some(f) => (f, true),
                    None => (flag, false),
                };
                DepNode::Conditional {
                    flag: flag.to_string(),
                    negated,
                    children: parse_seq(tokens, true)?,
                }
            }
            t => {
                if let Some(atom) = t.strip_prefix("!!") {
                    DepNode::Blocker {
                        atom: PackageAtom::parse(atom)?,
                        strong: true,
                    }
                } else if let Some(atom) = t.strip_prefix('!') {
                    DepNode::Blocker {
                        atom: PackageAtom::parse(atom)?,
                        strong: false,
                    }
                } else {
                    DepNode::Atom(PackageAtom::parse(t)?)
                }
            }
        };
        nodes.push(node);
    }

    if nested {
        Err(DependError::Unclosed)
    } else {
        Ok(nodes)
    }
}

fn expect_open<'a, I>(tokens: &mut I, after: &str) -> Result<(), DependError>
where
    I: Iterator<Item = &'a str>,
{
    match tokens.next() {
        Some("(") => Ok(()),
        _ => Err(DependError::ExpectedGroup(after.to_string())),
    }
}

fn conditional_holds(flag: &str, negated: bool, enabled: &UseSet) -> bool {
    enabled.contains(flag) != negated
}

/// Evaluate USE conditionals, leaving concrete requirements and blockers
pub fn evaluate(nodes: &[DepNode], enabled: &UseSet) -> DepSet {
    let mut set = DepSet::default();
    collect(nodes, enabled, &mut set);
    set
}

fn collect(nodes: &[DepNode], enabled: &UseSet, set: &mut DepSet) {
    for node in nodes {
        match node {
            DepNode::Atom(atom) => set.requires.push(DepChoice::One(atom.clone())),
            DepNode::Blocker { atom, .. } => set.blockers.push(atom.clone()),
            DepNode::Group(children) => collect(children, enabled, set),
            DepNode::Conditional {
                flag,
                negated,
                children,
            } => {
                if conditional_holds(flag, *negated, enabled) {
                    collect(children, enabled, set);
                }
            }
            DepNode::AnyOf(children) => {
                let alternatives: Vec<Vec<DepChoice>> = children
                    .iter()
                    .map(|child| {
                        let mut alt = DepSet::default();
                        collect(std::slice::from_ref(child), enabled, &mut alt);
                        alt.requires
                    })
                    .filter(|alt| !alt.is_empty())
                    .collect();
                match alternatives.len() {
                    0 => {}
                    1 => set.requires.extend(alternatives.into_iter().flatten()),
                    _ => set.requires.push(DepChoice::AnyOf(alternatives)),
                }
            }
        }
    }
}

/// Drop the tokens of USE conditionals that do not hold
///
/// Works on any token stream using the `flag? ( ... )` syntax, such as
/// `SRC_URI`. Plain groups are unwrapped.
pub fn flatten_conditionals(input: &str, enabled: &UseSet) -> Result<String, DependError> {
    let mut out: Vec<&str> = Vec::new();
    // One entry per open group: whether its content is kept
    let mut active: Vec<bool> = Vec::new();
    let mut tokens = input.split_whitespace();

    while let Some(token) = tokens.next() {
        let keep = active.last().copied().unwrap_or(true);
        match token {
            "(" => active.push(keep),
            ")" => {
                active.pop().ok_or(DependError::UnbalancedClose)?;
            }
            t if t.ends_with('?') => {
                expect_open(&mut tokens, t)?;
                let flag = t.trim_end_matches('?');
                let (flag, negated) = match flag.strip_prefix('!') {
                    Some(f) => (f, true),
                    None => (flag, false),
                };
                active.push(keep && conditional_holds(flag, negated, enabled));
            }
            t if keep => out.push(t),
            _ => {}
        }
    }

    if !active.is_empty() {
        return Err(DependError::Unclosed);
    }
    Ok(out.join(" "))
}
