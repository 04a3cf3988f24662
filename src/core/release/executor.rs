use std::path::{Path, PathBuf};

use crate::error::{Error, ErrorCode, Result};
use crate::manifest;
use crate::runner::{CommandRunner, CommandSpec, ShellKind, StepOutput};
use crate::utils::template::{self, TemplateVars};
use crate::version::{self, BumpKind};

use super::classify::{classify, FailureClass};
use super::types::{
    build_summary, FailurePolicy, ReleaseEnv, ReleaseOutcome, ReleasePlan, ReleaseRun,
    ReleaseStep, SkipCondition, StepAction, StepRecord, StepStatus,
};

/// Values interpolated into command templates. `version` and `tag` start at
/// the planned values and are replaced by what the version step writes.
struct ReleaseContext {
    branch: String,
    remote: String,
    version: String,
    tag: String,
    tag_prefix: String,
    bump: &'static str,
}

impl ReleaseContext {
    fn from_plan(plan: &ReleasePlan) -> Self {
        Self {
            branch: plan.branch.clone(),
            remote: plan.remote.clone(),
            version: plan.next_version.clone(),
            tag: plan.tag.clone(),
            tag_prefix: plan
                .tag
                .strip_suffix(plan.next_version.as_str())
                .unwrap_or_default()
                .to_string(),
            bump: plan.bump.as_str(),
        }
    }
}

enum StepResult {
    Done(StepRecord),
    NothingToCommit(StepRecord),
}

pub(crate) struct ReleaseExecutor<'a> {
    runner: &'a dyn CommandRunner,
    repo: PathBuf,
    shell: ShellKind,
    env: &'a ReleaseEnv,
}

impl<'a> ReleaseExecutor<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        repo: &Path,
        shell: ShellKind,
        env: &'a ReleaseEnv,
    ) -> Self {
        Self {
            runner,
            repo: repo.to_path_buf(),
            shell,
            env,
        }
    }

    /// Run every step in order. The first fatal failure stops the release;
    /// the returned error names the failing step and lists the steps that
    /// completed before it.
    pub fn execute(&self, plan: &ReleasePlan) -> Result<ReleaseRun> {
        let mut context = ReleaseContext::from_plan(plan);
        let mut records: Vec<StepRecord> = Vec::new();

        for step in &plan.steps {
            log_status!("deploy", "{}", step.label);

            match self.execute_step(step, &mut context) {
                Ok(StepResult::Done(record)) => records.push(record),
                Ok(StepResult::NothingToCommit(record)) => {
                    records.push(record);
                    log_status!("deploy", "No changes to commit");
                    return Ok(ReleaseRun {
                        outcome: ReleaseOutcome::NoChanges,
                        message: "No changes to commit".to_string(),
                        version: None,
                        tag: None,
                        timestamp: self.env.timestamp.clone(),
                        summary: build_summary(&records),
                        steps: records,
                    });
                }
                Err(err) => {
                    log_status!("deploy", "Step '{}' failed: {}", step.id, err.message);
                    let completed = serde_json::to_value(&records).unwrap_or_default();
                    return Err(err
                        .with_detail("step", step.id.as_str())
                        .with_detail("completedSteps", completed));
                }
            }
        }

        log_status!("deploy", "Released {}", context.tag);
        Ok(ReleaseRun {
            outcome: ReleaseOutcome::Released,
            message: "Deployment completed successfully".to_string(),
            version: Some(context.version),
            tag: Some(context.tag),
            timestamp: self.env.timestamp.clone(),
            summary: build_summary(&records),
            steps: records,
        })
    }

    fn execute_step(
        &self,
        step: &ReleaseStep,
        context: &mut ReleaseContext,
    ) -> Result<StepResult> {
        if let Some(condition) = &step.skip_when {
            if let Some(note) = self.skip_reason(condition, context)? {
                log_status!("deploy", "Skipping {}: {}", step.id, note);
                return Ok(StepResult::Done(record(
                    step,
                    StepStatus::Skipped,
                    None,
                    Some(note),
                )));
            }
        }

        match &step.action {
            StepAction::CleanCheck { command } => {
                let command = self.render(command, step.message.as_deref(), context);
                let out = self.runner.run(&self.spec(&command).capture())?;
                let changed = out.stdout.lines().filter(|l| !l.trim().is_empty()).count();
                let note = format!("{} changed path(s)", changed);
                let record = record(step, StepStatus::Succeeded, Some(command), Some(note));
                if changed == 0 {
                    return Ok(StepResult::NothingToCommit(record));
                }
                echo(&out);
                Ok(StepResult::Done(record))
            }
            StepAction::BumpVersion { bump, manifest } => {
                let note = self.bump_version(*bump, manifest, context)?;
                Ok(StepResult::Done(record(
                    step,
                    StepStatus::Succeeded,
                    None,
                    Some(note),
                )))
            }
            StepAction::Run { command } => {
                let command = self.render(command, step.message.as_deref(), context);
                self.run_with_policy(step, command, context)
                    .map(StepResult::Done)
            }
        }
    }

    fn skip_reason(
        &self,
        condition: &SkipCondition,
        context: &ReleaseContext,
    ) -> Result<Option<String>> {
        match condition {
            SkipCondition::Ci => Ok(self.env.ci.then(|| "CI environment".to_string())),
            SkipCondition::TagExists { probe } => {
                let probe = self.render(probe, None, context);
                let out = self.runner.run(&self.spec(&probe).capture())?;
                let exists = out.stdout.lines().any(|l| l.trim() == context.tag);
                Ok(exists.then(|| format!("tag {} already exists", context.tag)))
            }
        }
    }

    fn run_with_policy(
        &self,
        step: &ReleaseStep,
        command: String,
        context: &ReleaseContext,
    ) -> Result<StepRecord> {
        let spec = self
            .spec(&command)
            .capture_if(step.on_failure.inspects_output());

        let err = match self.runner.run(&spec) {
            Ok(out) => {
                echo(&out);
                return Ok(record(step, StepStatus::Succeeded, Some(command), None));
            }
            Err(err) if err.code == ErrorCode::CommandFailed => err,
            Err(err) => return Err(err),
        };

        let class = classify(&err.command_output());
        match &step.on_failure {
            FailurePolicy::Tolerate { classes } if classes.contains(&class) => {
                log_status!(
                    "deploy",
                    "{} failed ({}), continuing",
                    step.id,
                    class.describe()
                );
                Ok(record(
                    step,
                    StepStatus::Tolerated,
                    Some(command),
                    Some(class.describe().to_string()),
                ))
            }
            FailurePolicy::RetryAfter { recovery, classes } if classes.contains(&class) => {
                log_status!("deploy", "{} {}, recovering", step.id, class.describe());
                let recovery = self.render(recovery, None, context);
                self.runner
                    .run(&self.spec(&recovery))
                    .map_err(|e| e.with_detail("recovery", recovery.as_str()))?;

                // One retry only; a second failure is fatal whatever its class.
                let out = self.runner.run(&spec)?;
                echo(&out);
                Ok(record(
                    step,
                    StepStatus::Recovered,
                    Some(command),
                    Some(format!("{}; recovered with `{}`", class.describe(), recovery)),
                ))
            }
            _ => Err(annotate(err, class)),
        }
    }

    fn bump_version(
        &self,
        bump: BumpKind,
        manifest_file: &str,
        context: &mut ReleaseContext,
    ) -> Result<String> {
        let path = self.repo.join(manifest_file);
        let current = manifest::load(&path)?
            .require_version(&path.display().to_string())?
            .to_string();
        let next = version::increment_version(&current, bump)?;
        if next != current {
            version::write_version(&path, &current, &next)?;
        }

        // The manifest may have moved since planning, e.g. after the pull.
        let note = if next == context.version {
            format!("{} -> {}", current, next)
        } else {
            format!("{} -> {} (planned {})", current, next, context.version)
        };
        context.tag = format!("{}{}", context.tag_prefix, next);
        context.version = next;
        Ok(note)
    }

    fn spec(&self, command: &str) -> CommandSpec {
        CommandSpec::new(command).in_dir(&self.repo)
    }

    /// Render a command template. The optional message template is rendered
    /// first with raw values, then every value is quoted for the shell.
    fn render(&self, command: &str, message: Option<&str>, context: &ReleaseContext) -> String {
        let raw = [
            (TemplateVars::BRANCH, context.branch.as_str()),
            (TemplateVars::REMOTE, context.remote.as_str()),
            (TemplateVars::VERSION, context.version.as_str()),
            (TemplateVars::TAG, context.tag.as_str()),
            (TemplateVars::TIMESTAMP, self.env.timestamp.as_str()),
            (TemplateVars::BUMP, context.bump),
        ];
        let message = message.map(|m| template::render(m, &raw)).unwrap_or_default();

        let quoted: Vec<(&str, String)> = raw
            .iter()
            .map(|(key, value)| (*key, self.shell.quote(value)))
            .chain(std::iter::once((TemplateVars::MESSAGE, self.shell.quote(&message))))
            .collect();
        let pairs: Vec<(&str, &str)> = quoted.iter().map(|(k, v)| (*k, v.as_str())).collect();

        template::render(command, &pairs)
    }
}

fn record(
    step: &ReleaseStep,
    status: StepStatus,
    command: Option<String>,
    note: Option<String>,
) -> StepRecord {
    StepRecord {
        id: step.id.clone(),
        label: step.label.clone(),
        status,
        command,
        note,
    }
}

/// Forward captured output to the terminal.
fn echo(out: &StepOutput) {
    for line in out.stdout.lines().chain(out.stderr.lines()) {
        log_status!("deploy", "  {}", line);
    }
}

fn annotate(err: Error, class: FailureClass) -> Error {
    if class == FailureClass::Other {
        return err;
    }
    err.with_detail("failureClass", class.describe())
}
