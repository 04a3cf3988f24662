use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::manifest::{self, Manifest};

/// Something a sample project may declare in its manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// `test:e2e` script.
    E2eTests,
    /// `test:unit` script.
    UnitTests,
    /// `type-check` script.
    TypeCheck,
    /// Browser test framework dev dependency; its browsers must be installed
    /// before end-to-end tests run.
    BrowserRuntime,
}

impl Capability {
    /// Script name backing this capability, if it is script-based.
    pub fn script(&self) -> Option<&'static str> {
        match self {
            Capability::E2eTests => Some("test:e2e"),
            Capability::UnitTests => Some("test:unit"),
            Capability::TypeCheck => Some("type-check"),
            Capability::BrowserRuntime => None,
        }
    }
}

/// A sample project directory under the playground root.
#[derive(Debug, Clone)]
pub struct ProjectDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub manifest: Manifest,
    browser_dependency: String,
}

impl ProjectDescriptor {
    pub fn load(path: &Path, browser_dependency: &str) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let manifest = manifest::load_dir(path)?;
        Ok(Self {
            name,
            path: path.to_path_buf(),
            manifest,
            browser_dependency: browser_dependency.to_string(),
        })
    }

    pub fn supports(&self, capability: Capability) -> bool {
        match capability.script() {
            Some(script) => self.manifest.has_script(script),
            None => self.manifest.has_dev_dependency(&self.browser_dependency),
        }
    }

    /// Whether the directory name contains any of the given fragments.
    pub fn name_matches_any(&self, patterns: &[String]) -> bool {
        patterns.iter().any(|p| self.name.contains(p.as_str()))
    }
}

/// List project directories under `root`, sorted by name.
///
/// Hidden directories and `excluded` names are skipped; `filter` keeps only
/// names containing the substring.
pub fn discover_dirs(root: &Path, excluded: &[String], filter: Option<&str>) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(Error::playground_not_found(root.display().to_string()));
    }

    let entries = fs::read_dir(root).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", root.display())))
    })?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("read {}", root.display())))
        })?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || excluded.iter().any(|e| e == &name) {
            continue;
        }
        if filter.is_some_and(|f| !name.contains(f)) {
            continue;
        }
        dirs.push(path);
    }

    dirs.sort();
    Ok(dirs)
}

/// Discover and load every project under `root`.
pub fn discover(
    root: &Path,
    excluded: &[String],
    filter: Option<&str>,
    browser_dependency: &str,
) -> Result<Vec<ProjectDescriptor>> {
    discover_dirs(root, excluded, filter)?
        .iter()
        .map(|dir| ProjectDescriptor::load(dir, browser_dependency))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(root: &Path, name: &str, manifest: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("package.json"), manifest).unwrap();
    }

    fn names(dirs: &[PathBuf]) -> Vec<String> {
        dirs.iter()
            .map(|d| d.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn discover_dirs_skips_hidden_and_excluded() {
        let root = TempDir::new().unwrap();
        for name in ["vue-router", ".cache", "node_modules", "basic", ".git"] {
            fs::create_dir_all(root.path().join(name)).unwrap();
        }
        fs::write(root.path().join("README.md"), "# playground").unwrap();

        let dirs = discover_dirs(root.path(), &["node_modules".to_string()], None).unwrap();
        assert_eq!(names(&dirs), vec!["basic", "vue-router"]);
    }

    #[test]
    fn discover_dirs_applies_substring_filter() {
        let root = TempDir::new().unwrap();
        for name in ["default", "with-tests", "vitest", "vitest-with-tests"] {
            fs::create_dir_all(root.path().join(name)).unwrap();
        }

        let dirs = discover_dirs(root.path(), &[], Some("vitest")).unwrap();
        assert_eq!(names(&dirs), vec!["vitest", "vitest-with-tests"]);

        let none = discover_dirs(root.path(), &[], Some("nuxt")).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn discover_dirs_requires_root() {
        let root = TempDir::new().unwrap();
        let err = discover_dirs(&root.path().join("playground"), &[], None).unwrap_err();
        assert_eq!(err.code.as_str(), "playground.not_found");
    }

    #[test]
    fn supports_reads_scripts_and_dev_dependencies() {
        let root = TempDir::new().unwrap();
        project(
            root.path(),
            "playwright",
            r#"{
                "scripts": { "build": "vite build", "test:e2e": "playwright test", "type-check": "vue-tsc" },
                "devDependencies": { "@playwright/test": "^1.40.0" }
            }"#,
        );

        let projects = discover(root.path(), &[], None, "@playwright/test").unwrap();
        let p = &projects[0];
        assert_eq!(p.name, "playwright");
        assert!(p.supports(Capability::E2eTests));
        assert!(p.supports(Capability::BrowserRuntime));
        assert!(p.supports(Capability::TypeCheck));
        assert!(!p.supports(Capability::UnitTests));
    }

    #[test]
    fn supports_is_false_without_scripts_object() {
        let root = TempDir::new().unwrap();
        project(root.path(), "bare", r#"{"name": "bare"}"#);

        let projects = discover(root.path(), &[], None, "@playwright/test").unwrap();
        for capability in [
            Capability::E2eTests,
            Capability::UnitTests,
            Capability::TypeCheck,
            Capability::BrowserRuntime,
        ] {
            assert!(!projects[0].supports(capability));
        }
    }

    #[test]
    fn discover_reports_directory_without_manifest() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("empty")).unwrap();
        let err = discover(root.path(), &[], None, "@playwright/test").unwrap_err();
        assert_eq!(err.code.as_str(), "manifest.not_found");
    }
}
