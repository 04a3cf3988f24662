use clap::Args;
use serde::Serialize;

use shipyard::config;
use shipyard::playground::{self, PlaygroundPlan, PlaygroundReport};
use shipyard::ShellRunner;

use super::CmdResult;

#[derive(Args)]
pub struct PlaygroundArgs {
    /// Only test projects whose directory name contains this text
    filter: Option<String>,

    /// Repository root holding shipyard.json and the playground directory
    #[arg(long, default_value = ".")]
    path: String,

    /// Playground directory (overrides playground.root)
    #[arg(long)]
    root: Option<String>,

    /// List the commands each project would run without running them
    #[arg(long)]
    dry_run: bool,

    /// Command interpreter: sh, cmd or powershell
    #[arg(long)]
    shell: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "command")]
pub enum PlaygroundOutput {
    #[serde(rename = "playground.plan")]
    Plan { plan: PlaygroundPlan },
    #[serde(rename = "playground.run")]
    Run { report: PlaygroundReport },
}

pub fn run(args: PlaygroundArgs) -> CmdResult<PlaygroundOutput> {
    let repo = super::resolve_dir("path", &args.path)?;
    let config = config::load(&repo)?;
    let shell = super::resolve_shell(args.shell.as_deref(), &config)?;

    // A missing root is reported as playground.not_found by discovery.
    let root = match &args.root {
        Some(raw) => std::path::PathBuf::from(shellexpand::tilde(raw).to_string()),
        None => repo.join(&config.playground.root),
    };

    let plan = playground::plan(&root, &config.playground, args.filter.as_deref())?;
    if args.dry_run {
        return Ok((PlaygroundOutput::Plan { plan }, 0));
    }

    let runner = ShellRunner::new(shell);
    let report = playground::run(&plan, &runner)?;
    Ok((PlaygroundOutput::Run { report }, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args(path: &str) -> PlaygroundArgs {
        PlaygroundArgs {
            filter: None,
            path: path.to_string(),
            root: None,
            dry_run: true,
            shell: None,
        }
    }

    #[test]
    fn missing_playground_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = run(args(&dir.path().to_string_lossy())).unwrap_err();
        assert_eq!(err.code.as_str(), "playground.not_found");
    }

    #[test]
    fn dry_run_lists_commands_per_project() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("playground").join("with-tests");
        fs::create_dir_all(&project).unwrap();
        fs::write(
            project.join("package.json"),
            r#"{"scripts": {"build": "vite build", "test:unit": "vitest"}}"#,
        )
        .unwrap();

        let (output, code) = run(args(&dir.path().to_string_lossy())).unwrap();

        assert_eq!(code, 0);
        let PlaygroundOutput::Plan { plan } = output else {
            panic!("dry run executed commands");
        };
        assert_eq!(plan.projects.len(), 1);
        let commands: Vec<&str> = plan.projects[0]
            .commands
            .iter()
            .map(|c| c.command.as_str())
            .collect();
        assert_eq!(commands, vec!["npm run build", "npm run test:unit"]);
        assert_eq!(plan.projects[0].commands[1].env["CI"], "1");
    }
}
