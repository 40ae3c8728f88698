// src/lib.rs

//! Portconv
//!
//! Converts a ports-tree source repository (per-package metadata cache plus
//! distfile manifests) into a target spec tree of binary-package build
//! definitions.
//!
//! # Architecture
//!
//! - Source trees: metadata cache records indexed by `category/name-version`
//! - Rules: one TOML document steering selection, stages, subsets, finalizers
//! - Registry: every artifact generated in a run, keyed by package name
//! - Converter: parallel per-package pipeline with recursive dependency
//!   materialization and ownership conflict detection

pub mod artifact;
pub mod atom;
pub mod converter;
pub mod distfile;
mod error;
pub mod finalizer;
pub mod hash;
pub mod rules;
pub mod source;
pub mod subsets;
pub mod version;

pub use artifact::{ArtifactRegistry, ArtifactsMap, ArtifactsPack, GeneratedArtifact, PackageRef, PackageSpec};
pub use atom::{AtomError, PackageAtom};
pub use converter::{ConverterOptions, FsSpecWriter, LayerIndex, PortageConverter, RunReport, SpecWriter};
pub use distfile::{DistFile, ManifestFile, ReposcanIndex};
pub use error::{Error, Result};
pub use finalizer::Finalizer;
pub use hash::HashAlgorithm;
pub use rules::{RuleSet, StagePolicy};
pub use source::{SourcePackage, TreeIndex, TreeLoader};
pub use subsets::{ArchiveConfig, ArchiveSpec, SubsetsConfig, SubsetsDefinition};
pub use version::{PkgVersion, VersionConstraint};
