use clap::Args;
use serde::Serialize;

use shipyard::config::{self, ShipyardConfig};
use shipyard::release::{self, ReleaseEnv, ReleasePlan, ReleaseRun};
use shipyard::version::BumpKind;
use shipyard::ShellRunner;

use super::CmdResult;

#[derive(Args)]
pub struct DeployArgs {
    /// Repository root
    #[arg(long, default_value = ".")]
    path: String,

    /// Show the planned steps without running anything
    #[arg(long)]
    dry_run: bool,

    /// Version bump: patch, minor, major or none
    #[arg(long)]
    bump: Option<String>,

    /// Branch to pull from and push to
    #[arg(long)]
    branch: Option<String>,

    /// Remote to pull from and push to
    #[arg(long)]
    remote: Option<String>,

    /// Skip publishing the package
    #[arg(long)]
    no_publish: bool,

    /// Command interpreter: sh, cmd or powershell
    #[arg(long)]
    shell: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "command")]
pub enum DeployOutput {
    #[serde(rename = "deploy.plan")]
    Plan { plan: ReleasePlan },
    #[serde(rename = "deploy.run")]
    Run { run: ReleaseRun },
}

pub fn run(args: DeployArgs) -> CmdResult<DeployOutput> {
    let repo = super::resolve_dir("path", &args.path)?;
    let mut config = config::load(&repo)?;
    apply_overrides(&mut config, &args)?;
    config::validate(&config)?;

    let shell = super::resolve_shell(args.shell.as_deref(), &config)?;
    let env = ReleaseEnv::from_process();

    if args.dry_run {
        let plan = release::plan(&repo, &config.release, &env)?;
        return Ok((DeployOutput::Plan { plan }, 0));
    }

    let runner = ShellRunner::new(shell);
    let run = release::run(&repo, &config.release, &env, shell, &runner)?;
    Ok((DeployOutput::Run { run }, 0))
}

fn apply_overrides(config: &mut ShipyardConfig, args: &DeployArgs) -> shipyard::Result<()> {
    let release = &mut config.release;
    if let Some(bump) = &args.bump {
        release.bump = bump.parse::<BumpKind>()?;
    }
    if let Some(branch) = &args.branch {
        release.branch = branch.clone();
    }
    if let Some(remote) = &args.remote {
        release.remote = remote.clone();
    }
    if args.no_publish {
        release.publish = false;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> DeployArgs {
        DeployArgs {
            path: ".".to_string(),
            dry_run: false,
            bump: None,
            branch: None,
            remote: None,
            no_publish: false,
            shell: None,
        }
    }

    #[test]
    fn overrides_replace_config_values() {
        let mut config = ShipyardConfig::default();
        let args = DeployArgs {
            bump: Some("minor".to_string()),
            branch: Some("release".to_string()),
            no_publish: true,
            ..args()
        };

        apply_overrides(&mut config, &args).unwrap();

        assert_eq!(config.release.bump, BumpKind::Minor);
        assert_eq!(config.release.branch, "release");
        assert_eq!(config.release.remote, "origin");
        assert!(!config.release.publish);
    }

    #[test]
    fn invalid_bump_is_rejected() {
        let mut config = ShipyardConfig::default();
        let args = DeployArgs {
            bump: Some("huge".to_string()),
            ..args()
        };
        let err = apply_overrides(&mut config, &args).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }

    #[test]
    fn missing_manifest_is_not_found() {
        let dir = tempfile::TempDir::new().unwrap();
        let args = DeployArgs {
            path: dir.path().to_string_lossy().to_string(),
            dry_run: true,
            ..args()
        };

        let err = run(args).unwrap_err();

        assert_eq!(err.code.as_str(), "manifest.not_found");
    }

    #[test]
    fn dry_run_returns_plan_without_running() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{"version": "0.1.0"}"#).unwrap();
        let args = DeployArgs {
            path: dir.path().to_string_lossy().to_string(),
            dry_run: true,
            ..args()
        };

        let (output, code) = run(args).unwrap();

        assert_eq!(code, 0);
        match output {
            DeployOutput::Plan { plan } => assert_eq!(plan.next_version, "0.1.1"),
            DeployOutput::Run { .. } => panic!("dry run executed steps"),
        }
        let manifest = std::fs::read_to_string(dir.path().join("package.json")).unwrap();
        assert!(manifest.contains("0.1.0"));
    }
}
