// src/finalizer.rs

//! Post-installation steps attached to a generated package

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Ordered install-time steps, written as `finalize.yaml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finalizer {
    #[serde(default)]
    pub install: Vec<String>,
}

impl Finalizer {
    pub fn new(install: Vec<String>) -> Self {
        Self { install }
    }

    /// A finalizer is only worth emitting when it has steps
    pub fn is_valid(&self) -> bool {
        !self.install.is_empty()
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let data = self.to_yaml()?;
        fs::write(path, data).map_err(|e| Error::io(path, e))
    }
}
