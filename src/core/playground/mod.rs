//! Playground test driver.
//!
//! Installs dependencies once at the playground root, then builds and tests
//! each sample project with whichever scripts its manifest declares. The
//! first failing command aborts the run.

mod discovery;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::PlaygroundConfig;
use crate::error::Result;
use crate::runner::{CommandRunner, CommandSpec};

pub use discovery::{discover, discover_dirs, Capability, ProjectDescriptor};

#[derive(Debug, Clone, Serialize)]
pub struct PlannedCommand {
    pub label: String,
    pub command: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl PlannedCommand {
    fn new(label: &str, command: &str) -> Self {
        Self {
            label: label.to_string(),
            command: command.to_string(),
            env: BTreeMap::new(),
        }
    }

    fn with_env(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env.extend(env.clone());
        self
    }

    fn spec(&self, dir: &Path) -> CommandSpec {
        self.env
            .iter()
            .fold(CommandSpec::new(&self.command).in_dir(dir), |spec, (k, v)| {
                spec.env(k, v)
            })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectPlan {
    pub name: String,
    pub path: PathBuf,
    pub commands: Vec<PlannedCommand>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaygroundPlan {
    pub root: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    pub install: PlannedCommand,
    pub projects: Vec<ProjectPlan>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaygroundReport {
    pub root: PathBuf,
    pub projects: Vec<ProjectPlan>,
    pub commands_run: usize,
}

/// Commands a single project runs, in order.
pub fn plan_project(project: &ProjectDescriptor, config: &PlaygroundConfig) -> ProjectPlan {
    let mut commands = Vec::new();

    if let Some(build) = &config.build_command {
        commands.push(PlannedCommand::new("build", build));
    }
    if project.supports(Capability::BrowserRuntime) {
        commands.push(PlannedCommand::new(
            "install browsers",
            &config.e2e_install_command,
        ));
    }
    if project.supports(Capability::E2eTests) {
        commands.push(PlannedCommand::new("e2e tests", &config.e2e_command));
    }
    if project.supports(Capability::UnitTests) {
        let unit = PlannedCommand::new("unit tests", &config.unit_command);
        commands.push(if project.name_matches_any(&config.watch_mode_patterns) {
            unit.with_env(&config.watch_mode_env)
        } else {
            unit
        });
    }
    if project.supports(Capability::TypeCheck) {
        commands.push(PlannedCommand::new("type check", &config.type_check_command));
    }

    ProjectPlan {
        name: project.name.clone(),
        path: project.path.clone(),
        commands,
    }
}

/// Discover projects under `root` and plan every command.
pub fn plan(root: &Path, config: &PlaygroundConfig, filter: Option<&str>) -> Result<PlaygroundPlan> {
    let projects = discover(root, &config.excluded_dirs, filter, &config.e2e_dependency)?;

    Ok(PlaygroundPlan {
        root: root.to_path_buf(),
        filter: filter.map(str::to_string),
        install: PlannedCommand::new("install", &config.install_command),
        projects: projects.iter().map(|p| plan_project(p, config)).collect(),
    })
}

/// Execute a plan. Stops at the first failing command; the error carries the
/// project name and the command that failed.
pub fn run(plan: &PlaygroundPlan, runner: &dyn CommandRunner) -> Result<PlaygroundReport> {
    log_status!("playground", "Installing dependencies in {}", plan.root.display());
    runner
        .run(&plan.install.spec(&plan.root))
        .map_err(|e| e.with_detail("step", "install"))?;
    let mut commands_run = 1;

    if plan.projects.is_empty() {
        log_status!("playground", "No projects matched");
    }

    for project in &plan.projects {
        log_status!("playground", "Testing {}", project.name);
        for command in &project.commands {
            log_status!("playground", "{}: {}", project.name, command.label);
            runner
                .run(&command.spec(&project.path))
                .map_err(|e| e.with_detail("project", project.name.as_str()))?;
            commands_run += 1;
        }
    }

    Ok(PlaygroundReport {
        root: plan.root.clone(),
        projects: plan.projects.clone(),
        commands_run,
    })
}
