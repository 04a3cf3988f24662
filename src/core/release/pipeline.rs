use std::path::Path;

use crate::config::ReleaseConfig;
use crate::error::Result;
use crate::manifest;
use crate::runner::{CommandRunner, ShellKind};
use crate::version::{self, BumpKind};

use super::classify::FailureClass;
use super::executor::ReleaseExecutor;
use super::types::{
    ReleaseEnv, ReleasePlan, ReleaseRun, ReleaseStep, SkipCondition, StepAction, StepKind,
};

/// Execute a release by computing the plan and executing it.
/// What you preview (dry-run) is what you execute.
pub fn run(
    repo: &Path,
    config: &ReleaseConfig,
    env: &ReleaseEnv,
    shell: ShellKind,
    runner: &dyn CommandRunner,
) -> Result<ReleaseRun> {
    let release_plan = plan(repo, config, env)?;
    ReleaseExecutor::new(runner, repo, shell, env).execute(&release_plan)
}

/// Plan a release.
///
/// Quality gates run first (build, optional tests, format, lint fix, format
/// check), then the repository is synced, committed, versioned, tagged and
/// pushed. Publishing comes last and is skipped under CI.
pub fn plan(repo: &Path, config: &ReleaseConfig, env: &ReleaseEnv) -> Result<ReleasePlan> {
    let manifest_path = repo.join(&config.manifest);
    let current = manifest::load(&manifest_path)?
        .require_version(&manifest_path.display().to_string())?
        .to_string();
    let next = version::increment_version(&current, config.bump)?;
    let tag = format!("{}{}", config.tag_prefix, next);

    let commands = &config.commands;
    let mut steps = Vec::new();
    let mut hints = Vec::new();

    let gates = [
        (StepKind::Build, "Build project", &commands.build),
        (StepKind::Test, "Run tests", &commands.test),
        (StepKind::Format, "Format sources", &commands.format),
        (StepKind::LintFix, "Fix lint issues", &commands.lint_fix),
        (StepKind::FormatCheck, "Check formatting", &commands.format_check),
    ];
    for (kind, label, command) in gates {
        if let Some(command) = command {
            steps.push(ReleaseStep::run(kind, label, command));
        }
    }

    if let Some(pull) = &commands.pull {
        steps.push(
            ReleaseStep::run(StepKind::Pull, "Pull latest changes", pull)
                .tolerate(vec![FailureClass::NoUpstream]),
        );
    }

    steps.push(ReleaseStep::new(
        StepKind::Status,
        "Check for changes",
        StepAction::CleanCheck {
            command: commands.status.clone(),
        },
    ));
    steps.push(ReleaseStep::run(StepKind::Stage, "Stage changes", &commands.stage));
    steps.push(
        ReleaseStep::run(StepKind::Commit, "Commit changes", &commands.commit)
            .message(&config.commit_message),
    );

    if config.bump != BumpKind::None {
        steps.push(ReleaseStep::new(
            StepKind::Version,
            format!("Bump {} version", config.bump),
            StepAction::BumpVersion {
                bump: config.bump,
                manifest: config.manifest.clone(),
            },
        ));
        steps.push(
            ReleaseStep::run(
                StepKind::VersionCommit,
                "Commit version bump",
                &commands.version_commit,
            )
            .message(&config.version_commit_message),
        );
    }

    steps.push(
        ReleaseStep::run(StepKind::Tag, format!("Create tag {}", tag), &commands.tag)
            .message(&config.tag_message)
            .skip_when(SkipCondition::TagExists {
                probe: commands.tag_exists.clone(),
            })
            .tolerate(vec![FailureClass::AlreadyExists]),
    );
    steps.push(
        ReleaseStep::run(
            StepKind::Push,
            format!("Push {}", config.branch),
            &commands.push,
        )
        .retry_after(&commands.push_recover, vec![FailureClass::Rejected]),
    );
    steps.push(
        ReleaseStep::run(StepKind::PushTags, "Push tags", &commands.push_tags)
            .tolerate(vec![FailureClass::AlreadyExists]),
    );

    match (&commands.publish, config.publish) {
        (Some(publish), true) => {
            steps.push(
                ReleaseStep::run(StepKind::Publish, "Publish package", publish)
                    .skip_when(SkipCondition::Ci),
            );
            if env.ci {
                hints.push("CI detected: publish step will be skipped".to_string());
            }
        }
        _ => hints.push("Publishing disabled".to_string()),
    }

    if commands.test.is_none() {
        hints.push("No test command configured; set release.commands.test to gate on tests".to_string());
    }

    Ok(ReleasePlan {
        repo: repo.display().to_string(),
        branch: config.branch.clone(),
        remote: config.remote.clone(),
        current_version: current,
        next_version: next,
        tag,
        bump: config.bump,
        steps,
        hints,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::types::FailurePolicy;
    use std::fs;
    use tempfile::TempDir;

    fn repo_with_version(version: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("package.json"),
            format!("{{\n  \"name\": \"create-app\",\n  \"version\": \"{}\"\n}}\n", version),
        )
        .unwrap();
        dir
    }

    fn local_env() -> ReleaseEnv {
        ReleaseEnv::new(false, "2024-05-01 10:00:00")
    }

    #[test]
    fn plan_orders_default_steps() {
        let dir = repo_with_version("1.2.3");
        let plan = plan(dir.path(), &ReleaseConfig::default(), &local_env()).unwrap();

        assert_eq!(
            plan.step_ids(),
            vec![
                "build",
                "format",
                "lint-fix",
                "format-check",
                "pull",
                "status",
                "stage",
                "commit",
                "version",
                "version-commit",
                "tag",
                "push",
                "push-tags",
                "publish",
            ]
        );
        assert_eq!(plan.current_version, "1.2.3");
        assert_eq!(plan.next_version, "1.2.4");
        assert_eq!(plan.tag, "v1.2.4");
    }

    #[test]
    fn plan_includes_test_step_when_configured() {
        let dir = repo_with_version("1.2.3");
        let mut config = ReleaseConfig::default();
        config.commands.test = Some("npm run test".to_string());

        let plan = plan(dir.path(), &config, &local_env()).unwrap();
        assert_eq!(&plan.step_ids()[..2], ["build", "test"]);
    }

    #[test]
    fn plan_without_bump_skips_version_steps() {
        let dir = repo_with_version("2.0.0");
        let mut config = ReleaseConfig::default();
        config.bump = BumpKind::None;
        config.publish = false;

        let plan = plan(dir.path(), &config, &local_env()).unwrap();
        let ids = plan.step_ids();
        assert!(!ids.contains(&"version"));
        assert!(!ids.contains(&"version-commit"));
        assert!(!ids.contains(&"publish"));
        assert_eq!(plan.tag, "v2.0.0");
    }

    #[test]
    fn plan_allow_lists_only_benign_git_failures() {
        let dir = repo_with_version("1.2.3");
        let plan = plan(dir.path(), &ReleaseConfig::default(), &local_env()).unwrap();
        let policy = |id: &str| {
            plan.steps
                .iter()
                .find(|s| s.id == id)
                .map(|s| s.on_failure.clone())
                .unwrap()
        };

        assert_eq!(
            policy("pull"),
            FailurePolicy::Tolerate {
                classes: vec![FailureClass::NoUpstream]
            }
        );
        assert_eq!(
            policy("push-tags"),
            FailurePolicy::Tolerate {
                classes: vec![FailureClass::AlreadyExists]
            }
        );
        assert!(matches!(policy("push"), FailurePolicy::RetryAfter { .. }));
        for id in ["build", "format-check", "stage", "commit", "publish"] {
            assert_eq!(policy(id), FailurePolicy::Abort, "step {}", id);
        }
    }

    #[test]
    fn plan_requires_manifest() {
        let dir = TempDir::new().unwrap();
        let err = plan(dir.path(), &ReleaseConfig::default(), &local_env()).unwrap_err();
        assert_eq!(err.code.as_str(), "manifest.not_found");
    }

    #[cfg(unix)]
    #[test]
    fn releases_against_real_repository() {
        use crate::release::types::ReleaseOutcome;
        use crate::runner::ShellRunner;
        use std::process::Command;

        fn git(dir: &Path, args: &[&str]) -> String {
            let out = Command::new("git")
                .args(args)
                .current_dir(dir)
                .output()
                .unwrap();
            assert!(
                out.status.success(),
                "git {:?}: {}",
                args,
                String::from_utf8_lossy(&out.stderr)
            );
            String::from_utf8_lossy(&out.stdout).trim().to_string()
        }

        if Command::new("git").arg("--version").output().is_err() {
            return;
        }

        let remote = TempDir::new().unwrap();
        git(remote.path(), &["init", "--bare", "-q"]);

        let work = repo_with_version("1.0.0");
        let dir = work.path();
        git(dir, &["init", "-q"]);
        git(dir, &["checkout", "-q", "-b", "main"]);
        for (key, value) in [
            ("user.name", "Release Bot"),
            ("user.email", "release@example.com"),
            ("commit.gpgsign", "false"),
            ("tag.gpgsign", "false"),
        ] {
            git(dir, &["config", key, value]);
        }
        git(
            dir,
            &["remote", "add", "origin", remote.path().to_str().unwrap()],
        );

        let mut config = ReleaseConfig::default();
        config.publish = false;
        config.commands.build = None;
        config.commands.format = None;
        config.commands.lint_fix = None;
        config.commands.format_check = None;

        let runner = ShellRunner::new(ShellKind::Sh);
        let first = run(dir, &config, &local_env(), ShellKind::Sh, &runner).unwrap();

        assert_eq!(first.outcome, ReleaseOutcome::Released);
        assert_eq!(first.tag.as_deref(), Some("v1.0.1"));
        // Empty remote: nothing to pull yet.
        assert_eq!(first.summary.tolerated, 1);
        assert_eq!(git(remote.path(), &["tag", "-l"]), "v1.0.1");
        assert_eq!(
            git(dir, &["log", "-1", "--format=%s"]),
            "chore: release v1.0.1"
        );
        assert_eq!(
            git(dir, &["log", "-1", "--skip=1", "--format=%s"]),
            "chore: automated deployment 2024-05-01 10:00:00"
        );

        let second = run(dir, &config, &local_env(), ShellKind::Sh, &runner).unwrap();
        assert_eq!(second.outcome, ReleaseOutcome::NoChanges);
        assert_eq!(git(dir, &["tag", "-l"]), "v1.0.1");
    }

    #[test]
    fn plan_notes_ci_publish_skip() {
        let dir = repo_with_version("1.2.3");
        let env = ReleaseEnv::new(true, "2024-05-01 10:00:00");
        let plan = plan(dir.path(), &ReleaseConfig::default(), &env).unwrap();
        assert!(plan.hints.iter().any(|h| h.contains("CI")));
    }
}
