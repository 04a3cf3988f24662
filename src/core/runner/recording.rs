//! Scripted `CommandRunner` for tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use super::{CommandRunner, CommandSpec, StepOutput};
use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub(crate) struct Scripted {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl Scripted {
    pub fn ok(stdout: &str) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn fail(exit_code: i32, stderr: &str) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

/// Records every command it is asked to run and answers from a script.
/// Unscripted commands succeed with empty output.
#[derive(Default)]
pub(crate) struct RecordingRunner {
    script: RefCell<HashMap<String, VecDeque<Scripted>>>,
    calls: RefCell<Vec<CommandSpec>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next invocation of `command`. Responses for
    /// the same command are consumed in order.
    pub fn on(self, command: &str, response: Scripted) -> Self {
        self.script
            .borrow_mut()
            .entry(command.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.command.clone()).collect()
    }

    pub fn specs(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.command == command)
            .count()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, spec: &CommandSpec) -> Result<StepOutput> {
        self.calls.borrow_mut().push(spec.clone());

        let response = self
            .script
            .borrow_mut()
            .get_mut(&spec.command)
            .and_then(VecDeque::pop_front)
            .unwrap_or_default();

        StepOutput {
            command: spec.command.clone(),
            cwd: spec.cwd.as_ref().map(|p| p.display().to_string()),
            exit_code: response.exit_code,
            success: response.exit_code == 0,
            stdout: response.stdout,
            stderr: response.stderr,
        }
        .into_result()
    }
}
