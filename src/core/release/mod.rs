mod classify;
mod executor;
mod pipeline;
mod types;

pub use classify::{classify, FailureClass};
pub use pipeline::{plan, run};
pub use types::{
    now_timestamp, FailurePolicy, ReleaseEnv, ReleaseOutcome, ReleasePlan, ReleaseRun,
    ReleaseStep, ReleaseSummary, SkipCondition, StepAction, StepKind, StepRecord, StepStatus,
};
