//! `package.json` metadata: version, declared scripts and dev dependencies.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::utils::io;

pub const MANIFEST_FILE: &str = "package.json";

/// The subset of `package.json` the release and playground flows consult.
///
/// Absent `scripts`/`devDependencies` objects (or `null`) read as empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    scripts: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    dev_dependencies: Option<BTreeMap<String, Value>>,
}

impl Manifest {
    pub fn parse(content: &str, path: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::manifest_invalid(path, e.to_string()))
    }

    pub fn has_script(&self, name: &str) -> bool {
        self.scripts.as_ref().is_some_and(|s| s.contains_key(name))
    }

    pub fn has_dev_dependency(&self, name: &str) -> bool {
        self.dev_dependencies
            .as_ref()
            .is_some_and(|d| d.contains_key(name))
    }

    /// Declared version, required for releases.
    pub fn require_version(&self, path: &str) -> Result<&str> {
        self.version
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::manifest_invalid(path, "missing \"version\" field"))
    }
}

/// Load and parse a manifest file.
pub fn load(path: &Path) -> Result<Manifest> {
    let display = path.display().to_string();
    if !path.is_file() {
        return Err(Error::manifest_not_found(display));
    }
    let content = io::read_file(path, "read manifest")?;
    Manifest::parse(&content, &display)
}

/// Load `package.json` from a directory.
pub fn load_dir(dir: &Path) -> Result<Manifest> {
    load(&dir.join(MANIFEST_FILE))
}
