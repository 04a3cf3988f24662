use serde::Serialize;

use super::classify::FailureClass;
use crate::version::BumpKind;

/// Release steps, in default execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    Build,
    Test,
    Format,
    LintFix,
    FormatCheck,
    Pull,
    Status,
    Stage,
    Commit,
    Version,
    VersionCommit,
    Tag,
    Push,
    PushTags,
    Publish,
}

impl StepKind {
    pub fn id(&self) -> &'static str {
        match self {
            StepKind::Build => "build",
            StepKind::Test => "test",
            StepKind::Format => "format",
            StepKind::LintFix => "lint-fix",
            StepKind::FormatCheck => "format-check",
            StepKind::Pull => "pull",
            StepKind::Status => "status",
            StepKind::Stage => "stage",
            StepKind::Commit => "commit",
            StepKind::Version => "version",
            StepKind::VersionCommit => "version-commit",
            StepKind::Tag => "tag",
            StepKind::Push => "push",
            StepKind::PushTags => "push-tags",
            StepKind::Publish => "publish",
        }
    }
}

/// What a step does when it runs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepAction {
    /// Run a command template.
    Run { command: String },
    /// Run a command template that lists pending changes; empty output ends
    /// the release early with nothing to commit.
    CleanCheck { command: String },
    /// Rewrite the manifest version in place.
    BumpVersion { bump: BumpKind, manifest: String },
}

/// How a step's command failure is handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Any failure aborts the release.
    Abort,
    /// Failures of the listed classes are recorded and the release continues.
    Tolerate { classes: Vec<FailureClass> },
    /// On a failure of the listed classes, run `recovery` once and retry the
    /// step once.
    RetryAfter {
        recovery: String,
        classes: Vec<FailureClass>,
    },
}

impl FailurePolicy {
    /// Steps whose failures are inspected need their output captured.
    pub fn inspects_output(&self) -> bool {
        !matches!(self, FailurePolicy::Abort)
    }
}

/// Condition under which a step is skipped without running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum SkipCondition {
    /// The probe command prints the tag name when the tag exists locally.
    TagExists { probe: String },
    /// Running under continuous integration.
    Ci,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseStep {
    pub id: String,
    pub label: String,
    #[serde(flatten)]
    pub action: StepAction,
    /// Message template rendered into `{{message}}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub on_failure: FailurePolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_when: Option<SkipCondition>,
}

impl ReleaseStep {
    pub(crate) fn new(kind: StepKind, label: impl Into<String>, action: StepAction) -> Self {
        Self {
            id: kind.id().to_string(),
            label: label.into(),
            action,
            message: None,
            on_failure: FailurePolicy::Abort,
            skip_when: None,
        }
    }

    pub(crate) fn run(kind: StepKind, label: impl Into<String>, command: &str) -> Self {
        Self::new(
            kind,
            label,
            StepAction::Run {
                command: command.to_string(),
            },
        )
    }

    pub(crate) fn message(mut self, template: &str) -> Self {
        self.message = Some(template.to_string());
        self
    }

    pub(crate) fn tolerate(mut self, classes: Vec<FailureClass>) -> Self {
        self.on_failure = FailurePolicy::Tolerate { classes };
        self
    }

    pub(crate) fn retry_after(mut self, recovery: &str, classes: Vec<FailureClass>) -> Self {
        self.on_failure = FailurePolicy::RetryAfter {
            recovery: recovery.to_string(),
            classes,
        };
        self
    }

    pub(crate) fn skip_when(mut self, condition: SkipCondition) -> Self {
        self.skip_when = Some(condition);
        self
    }
}

/// The ordered step list for one release, computed before anything runs.
#[derive(Debug, Clone, Serialize)]
pub struct ReleasePlan {
    pub repo: String,
    pub branch: String,
    pub remote: String,
    pub current_version: String,
    pub next_version: String,
    pub tag: String,
    pub bump: BumpKind,
    pub steps: Vec<ReleaseStep>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

impl ReleasePlan {
    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }
}

/// Process environment the release depends on, captured once by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseEnv {
    /// Continuous integration; publishing is skipped.
    pub ci: bool,
    /// Timestamp rendered into `{{timestamp}}` (UTC, `YYYY-MM-DD HH:MM:SS`).
    pub timestamp: String,
}

impl ReleaseEnv {
    pub fn new(ci: bool, timestamp: impl Into<String>) -> Self {
        Self {
            ci,
            timestamp: timestamp.into(),
        }
    }

    /// Read `CI` from the process environment and stamp the current time.
    /// A set but empty `CI` does not count.
    pub fn from_process() -> Self {
        let ci = std::env::var_os("CI").is_some_and(|v| !v.is_empty());
        Self::new(ci, now_timestamp())
    }
}

pub fn now_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Skipped,
    /// Failed with an allow-listed failure; the release continued.
    Tolerated,
    /// Failed, recovered, and succeeded on retry.
    Recovered,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub id: String,
    pub label: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseOutcome {
    Released,
    /// Working tree was clean after formatting; nothing was committed.
    NoChanges,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseSummary {
    pub total_steps: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub tolerated: usize,
    pub recovered: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseRun {
    pub outcome: ReleaseOutcome,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub timestamp: String,
    pub steps: Vec<StepRecord>,
    pub summary: ReleaseSummary,
}

impl ReleaseRun {
    pub fn step(&self, id: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.id == id)
    }
}

pub(crate) fn build_summary(steps: &[StepRecord]) -> ReleaseSummary {
    let count = |status: StepStatus| steps.iter().filter(|s| s.status == status).count();
    ReleaseSummary {
        total_steps: steps.len(),
        succeeded: count(StepStatus::Succeeded),
        skipped: count(StepStatus::Skipped),
        tolerated: count(StepStatus::Tolerated),
        recovered: count(StepStatus::Recovered),
    }
}
