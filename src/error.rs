// src/error.rs

//! Error types for the conversion engine

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading trees and rules or generating specs
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid invocation detected before any work starts
    #[error("Usage error: {0}")]
    UsageError(String),

    /// Filesystem failure, always carrying the offending path
    #[error("I/O error on {}: {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed rules document
    #[error("Failed to parse rules file {}: {message}", path.display())]
    RulesParseError { path: PathBuf, message: String },

    /// Malformed source record, dependency string or spec file
    #[error("Parse error in {location}: {message}")]
    ParseError { location: String, message: String },

    /// Requested item does not exist
    #[error("{0}")]
    NotFoundError(String),

    /// Dependency that is neither registered nor available in any tree
    #[error("Package {package}: missing dependency {dependency}")]
    MissingDependency { package: String, dependency: String },

    /// Dependency chain re-entered a package already being generated
    #[error("Circular dependency: {}", chain.join(" -> "))]
    CycleError { chain: Vec<String> },

    /// Version string that does not follow the version grammar
    #[error("Invalid version: {0}")]
    VersionError(String),

    /// Failure encoding a spec or report
    #[error("Serialization error: {0}")]
    SerializeError(String),

    /// Writing a generated spec to the target tree failed; ends the run
    #[error("Failed to emit {package}: {source}")]
    EmissionError {
        package: String,
        #[source]
        source: Box<Error>,
    },

    /// Generation of one package failed
    #[error("Failed to generate {package}: {source}")]
    PackageFailed {
        package: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::IoError {
            path: path.into(),
            source,
        }
    }

    /// Build a parse error for the given location
    pub fn parse(location: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ParseError {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a missing dependency (possibly wrapped)
    pub fn is_missing_dependency(&self) -> bool {
        match self {
            Error::MissingDependency { .. } => true,
            Error::PackageFailed { source, .. } => source.is_missing_dependency(),
            _ => false,
        }
    }

    /// Whether the run must stop regardless of `continue_with_error`
    ///
    /// Fatal errors are never dropped as optional or ignorable dependencies.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::EmissionError { .. } => true,
            Error::PackageFailed { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::SerializeError(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::SerializeError(e.to_string())
    }
}

/// Result type for conversion operations
pub type Result<T> = std::result::Result<T, Error>;
