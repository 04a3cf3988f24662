//! Repository configuration (`shipyard.json`).
//!
//! Every field has a default matching the stock scaffolding repo, so the file
//! is optional. CLI flags are applied on top by the command layer.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::runner::ShellKind;
use crate::utils::io;
use crate::version::BumpKind;

pub const CONFIG_FILE: &str = "shipyard.json";

/// Root configuration structure for shipyard.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ShipyardConfig {
    #[serde(default)]
    pub release: ReleaseConfig,

    #[serde(default)]
    pub playground: PlaygroundConfig,

    /// Interpreter for all commands. Defaults to the platform's native shell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<ShellKind>,
}

impl ShipyardConfig {
    pub fn shell(&self) -> ShellKind {
        self.shell.unwrap_or_else(ShellKind::native)
    }
}

/// Release orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default)]
    pub bump: BumpKind,

    #[serde(default = "default_tag_prefix")]
    pub tag_prefix: String,

    /// Manifest holding the version, relative to the repository root.
    #[serde(default = "default_manifest")]
    pub manifest: String,

    #[serde(default = "default_true")]
    pub publish: bool,

    #[serde(default = "default_commit_message")]
    pub commit_message: String,

    #[serde(default = "default_version_commit_message")]
    pub version_commit_message: String,

    #[serde(default = "default_tag_message")]
    pub tag_message: String,

    #[serde(default)]
    pub commands: ReleaseCommands,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            branch: default_branch(),
            remote: default_remote(),
            bump: BumpKind::default(),
            tag_prefix: default_tag_prefix(),
            manifest: default_manifest(),
            publish: true,
            commit_message: default_commit_message(),
            version_commit_message: default_version_commit_message(),
            tag_message: default_tag_message(),
            commands: ReleaseCommands::default(),
        }
    }
}

/// Command templates for each release step. Optional steps are disabled by
/// setting them to `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseCommands {
    #[serde(default = "default_build")]
    pub build: Option<String>,
    #[serde(default)]
    pub test: Option<String>,
    #[serde(default = "default_format")]
    pub format: Option<String>,
    #[serde(default = "default_lint_fix")]
    pub lint_fix: Option<String>,
    #[serde(default = "default_format_check")]
    pub format_check: Option<String>,
    #[serde(default = "default_pull")]
    pub pull: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_stage")]
    pub stage: String,
    #[serde(default = "default_commit")]
    pub commit: String,
    #[serde(default = "default_version_commit")]
    pub version_commit: String,
    #[serde(default = "default_tag_exists")]
    pub tag_exists: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default = "default_push")]
    pub push: String,
    #[serde(default = "default_push_recover")]
    pub push_recover: String,
    #[serde(default = "default_push_tags")]
    pub push_tags: String,
    #[serde(default = "default_publish")]
    pub publish: Option<String>,
}

impl Default for ReleaseCommands {
    fn default() -> Self {
        Self {
            build: default_build(),
            test: None,
            format: default_format(),
            lint_fix: default_lint_fix(),
            format_check: default_format_check(),
            pull: default_pull(),
            status: default_status(),
            stage: default_stage(),
            commit: default_commit(),
            version_commit: default_version_commit(),
            tag_exists: default_tag_exists(),
            tag: default_tag(),
            push: default_push(),
            push_recover: default_push_recover(),
            push_tags: default_push_tags(),
            publish: default_publish(),
        }
    }
}

/// Playground test driver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaygroundConfig {
    /// Directory containing the generated sample projects, relative to the
    /// repository root.
    #[serde(default = "default_playground_root")]
    pub root: String,

    #[serde(default = "default_excluded_dirs")]
    pub excluded_dirs: Vec<String>,

    #[serde(default = "default_install_command")]
    pub install_command: String,

    #[serde(default = "default_build")]
    pub build_command: Option<String>,

    /// Dev dependency whose presence means the browser runtime must be
    /// installed before end-to-end tests.
    #[serde(default = "default_e2e_dependency")]
    pub e2e_dependency: String,

    #[serde(default = "default_e2e_install_command")]
    pub e2e_install_command: String,

    #[serde(default = "default_e2e_command")]
    pub e2e_command: String,

    #[serde(default = "default_unit_command")]
    pub unit_command: String,

    #[serde(default = "default_type_check_command")]
    pub type_check_command: String,

    /// Project name fragments whose unit test runner watches by default.
    #[serde(default = "default_watch_mode_patterns")]
    pub watch_mode_patterns: Vec<String>,

    /// Environment that turns watch mode off for those projects.
    #[serde(default = "default_watch_mode_env")]
    pub watch_mode_env: BTreeMap<String, String>,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            root: default_playground_root(),
            excluded_dirs: default_excluded_dirs(),
            install_command: default_install_command(),
            build_command: default_build(),
            e2e_dependency: default_e2e_dependency(),
            e2e_install_command: default_e2e_install_command(),
            e2e_command: default_e2e_command(),
            unit_command: default_unit_command(),
            type_check_command: default_type_check_command(),
            watch_mode_patterns: default_watch_mode_patterns(),
            watch_mode_env: default_watch_mode_env(),
        }
    }
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_tag_prefix() -> String {
    "v".to_string()
}

fn default_manifest() -> String {
    crate::manifest::MANIFEST_FILE.to_string()
}

fn default_commit_message() -> String {
    "chore: automated deployment {{timestamp}}".to_string()
}

fn default_version_commit_message() -> String {
    "chore: release {{tag}}".to_string()
}

fn default_tag_message() -> String {
    "Release {{tag}}".to_string()
}

fn default_build() -> Option<String> {
    Some("npm run build".to_string())
}

fn default_format() -> Option<String> {
    Some("npm run format".to_string())
}

fn default_lint_fix() -> Option<String> {
    Some("npm run lint:fix".to_string())
}

fn default_format_check() -> Option<String> {
    Some("npm run format:check".to_string())
}

fn default_pull() -> Option<String> {
    Some("git pull {{remote}} {{branch}}".to_string())
}

fn default_status() -> String {
    "git status --porcelain".to_string()
}

fn default_stage() -> String {
    "git add .".to_string()
}

fn default_commit() -> String {
    "git commit -m {{message}}".to_string()
}

fn default_version_commit() -> String {
    "git commit -am {{message}}".to_string()
}

fn default_tag_exists() -> String {
    "git tag -l {{tag}}".to_string()
}

fn default_tag() -> String {
    "git tag -a {{tag}} -m {{message}}".to_string()
}

fn default_push() -> String {
    "git push {{remote}} {{branch}}".to_string()
}

fn default_push_recover() -> String {
    "git pull --rebase {{remote}} {{branch}}".to_string()
}

fn default_push_tags() -> String {
    "git push {{remote}} --tags".to_string()
}

fn default_publish() -> Option<String> {
    Some("npm publish".to_string())
}

fn default_playground_root() -> String {
    "playground".to_string()
}

fn default_excluded_dirs() -> Vec<String> {
    vec!["node_modules".to_string()]
}

fn default_install_command() -> String {
    "npm install".to_string()
}

fn default_e2e_dependency() -> String {
    "@playwright/test".to_string()
}

fn default_e2e_install_command() -> String {
    "npx playwright install --with-deps".to_string()
}

fn default_e2e_command() -> String {
    "npm run test:e2e".to_string()
}

fn default_unit_command() -> String {
    "npm run test:unit".to_string()
}

fn default_type_check_command() -> String {
    "npm run type-check".to_string()
}

fn default_watch_mode_patterns() -> Vec<String> {
    vec!["vitest".to_string(), "with-tests".to_string()]
}

fn default_watch_mode_env() -> BTreeMap<String, String> {
    BTreeMap::from([("CI".to_string(), "1".to_string())])
}

// =============================================================================
// Loading
// =============================================================================

pub fn config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(CONFIG_FILE)
}

/// Load `shipyard.json` from the repository root, falling back to defaults
/// when the file does not exist.
pub fn load(repo_root: &Path) -> Result<ShipyardConfig> {
    let path = config_path(repo_root);
    if !path.exists() {
        return Ok(ShipyardConfig::default());
    }

    let content = io::read_file(&path, "read config")?;
    let config: ShipyardConfig = serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &ShipyardConfig) -> Result<()> {
    let release = &config.release;
    for (key, value) in [
        ("release.branch", &release.branch),
        ("release.remote", &release.remote),
        ("release.manifest", &release.manifest),
    ] {
        if value.trim().is_empty() {
            return Err(Error::config_invalid_value(
                key,
                Some(value.clone()),
                "must not be empty",
            ));
        }
    }

    if config.playground.root.trim().is_empty() {
        return Err(Error::config_invalid_value(
            "playground.root",
            None,
            "must not be empty",
        ));
    }

    Ok(())
}
