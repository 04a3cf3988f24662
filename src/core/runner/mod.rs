//! Local command execution through the host's command interpreter.
//!
//! Every side effect of a release or playground run is delegated to an
//! external tool. The contract with those tools is: invoke this command line,
//! in this directory, and check the exit code. Retry policy lives in the
//! callers; this layer never retries.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CommandFailedDetails, Error, Result};
use crate::utils::shell;

#[cfg(test)]
pub(crate) mod recording;

/// Command interpreter used to run command lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellKind {
    /// POSIX `sh -c`
    Sh,
    /// `cmd /C`
    Cmd,
    /// `powershell -Command` (`pwsh` outside Windows)
    PowerShell,
}

impl ShellKind {
    /// Native interpreter for the host platform.
    pub fn native() -> Self {
        if cfg!(windows) {
            ShellKind::Cmd
        } else {
            ShellKind::Sh
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShellKind::Sh => "sh",
            ShellKind::Cmd => "cmd",
            ShellKind::PowerShell => "powershell",
        }
    }

    pub fn program(&self) -> &'static str {
        match self {
            ShellKind::Sh => "sh",
            ShellKind::Cmd => "cmd",
            ShellKind::PowerShell if cfg!(windows) => "powershell.exe",
            ShellKind::PowerShell => "pwsh",
        }
    }

    /// Quote a single value for interpolation into a command line.
    pub fn quote(&self, value: &str) -> String {
        match self {
            ShellKind::Sh => shell::quote_arg(value),
            ShellKind::Cmd => shell::quote_cmd_arg(value),
            ShellKind::PowerShell => shell::quote_powershell_arg(value),
        }
    }

    fn command(&self, command_line: &str) -> Command {
        let mut cmd = Command::new(self.program());
        match self {
            ShellKind::Sh => {
                cmd.args(["-c", command_line]);
            }
            ShellKind::Cmd => {
                cmd.arg("/C");
                push_raw_arg(&mut cmd, command_line);
            }
            ShellKind::PowerShell => {
                cmd.args(["-NoProfile", "-NonInteractive", "-Command", command_line]);
            }
        }
        cmd
    }
}

impl Default for ShellKind {
    fn default() -> Self {
        Self::native()
    }
}

impl FromStr for ShellKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sh" | "bash" | "posix" => Ok(ShellKind::Sh),
            "cmd" | "cmd.exe" => Ok(ShellKind::Cmd),
            "powershell" | "powershell.exe" | "pwsh" => Ok(ShellKind::PowerShell),
            other => Err(Error::validation_invalid_argument(
                "shell",
                format!("Unknown shell '{}'", other),
                None,
                Some(vec![
                    "sh".to_string(),
                    "cmd".to_string(),
                    "powershell".to_string(),
                ]),
            )),
        }
    }
}

// cmd.exe does its own quote parsing; the command line must reach it verbatim.
#[cfg(windows)]
fn push_raw_arg(cmd: &mut Command, command_line: &str) {
    use std::os::windows::process::CommandExt;
    cmd.raw_arg(command_line);
}

#[cfg(not(windows))]
fn push_raw_arg(cmd: &mut Command, command_line: &str) {
    cmd.arg(command_line);
}

/// Where a command's output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Forward output to the terminal as it is produced. Child stdout is sent
    /// to our stderr so stdout stays reserved for the JSON response.
    #[default]
    Stream,
    /// Collect stdout and stderr for inspection.
    Capture,
}

/// A command line to execute, with its working directory and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub command: String,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub mode: OutputMode,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
            env: Vec::new(),
            mode: OutputMode::Stream,
        }
    }

    /// Run in a specific working directory.
    pub fn in_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// Add an environment variable if condition is true.
    pub fn env_if(self, condition: bool, key: &str, value: &str) -> Self {
        if condition {
            self.env(key, value)
        } else {
            self
        }
    }

    /// Capture output instead of streaming it.
    pub fn capture(mut self) -> Self {
        self.mode = OutputMode::Capture;
        self
    }

    pub fn capture_if(self, condition: bool) -> Self {
        if condition {
            self.capture()
        } else {
            self
        }
    }

    fn cwd_display(&self) -> Option<String> {
        self.cwd.as_ref().map(|p| p.display().to_string())
    }
}

/// Captured result of one external command.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutput {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    pub exit_code: i32,
    pub success: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

impl StepOutput {
    /// Convert into a `command.failed` error unless the exit status was zero.
    pub fn into_result(self) -> Result<StepOutput> {
        if self.success {
            return Ok(self);
        }
        Err(Error::command_failed(CommandFailedDetails {
            command: self.command,
            exit_code: self.exit_code,
            cwd: self.cwd,
            stdout: self.stdout,
            stderr: self.stderr,
        }))
    }
}

/// Executes command lines. Implementations must not retry.
pub trait CommandRunner {
    /// Run a command to completion. Resolves only when it exits with status
    /// zero; any other exit is a `command.failed` error.
    fn run(&self, spec: &CommandSpec) -> Result<StepOutput>;
}

/// Runs commands through a host command interpreter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner {
    shell: ShellKind,
}

impl ShellRunner {
    pub fn new(shell: ShellKind) -> Self {
        Self { shell }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, spec: &CommandSpec) -> Result<StepOutput> {
        let mut cmd = self.shell.command(&spec.command);

        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        cmd.envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let spawn_error =
            |e: io::Error| Error::command_spawn_failed(&spec.command, self.shell.program(), e.to_string());

        let output = match spec.mode {
            OutputMode::Capture => {
                let out = cmd.stdin(Stdio::null()).output().map_err(spawn_error)?;
                from_output(spec, out)
            }
            OutputMode::Stream => {
                let status = cmd
                    .stdin(Stdio::inherit())
                    .stdout(Stdio::from(io::stderr()))
                    .stderr(Stdio::inherit())
                    .status()
                    .map_err(spawn_error)?;
                StepOutput {
                    command: spec.command.clone(),
                    cwd: spec.cwd_display(),
                    exit_code: status.code().unwrap_or(-1),
                    success: status.success(),
                    stdout: String::new(),
                    stderr: String::new(),
                }
            }
        };

        output.into_result()
    }
}

fn from_output(spec: &CommandSpec, out: Output) -> StepOutput {
    StepOutput {
        command: spec.command.clone(),
        cwd: spec.cwd_display(),
        exit_code: out.status.code().unwrap_or(-1),
        success: out.status.success(),
        stdout: String::from_utf8_lossy(&out.stdout).trim_end().to_string(),
        stderr: String::from_utf8_lossy(&out.stderr).trim_end().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_kind_parses_aliases() {
        assert_eq!("sh".parse::<ShellKind>().unwrap(), ShellKind::Sh);
        assert_eq!("CMD".parse::<ShellKind>().unwrap(), ShellKind::Cmd);
        assert_eq!(
            "powershell.exe".parse::<ShellKind>().unwrap(),
            ShellKind::PowerShell
        );
    }

    #[test]
    fn shell_kind_rejects_unknown() {
        let err = "fish".parse::<ShellKind>().unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }

    #[test]
    fn shell_kind_quotes_per_interpreter() {
        assert_eq!(ShellKind::Sh.quote("a b"), "'a b'");
        assert_eq!(ShellKind::Cmd.quote("a b"), "\"a b\"");
        assert_eq!(ShellKind::PowerShell.quote("a b"), "'a b'");
    }

    #[test]
    fn command_spec_builder_collects_env() {
        let spec = CommandSpec::new("npm run test:unit")
            .env_if(true, "CI", "1")
            .env_if(false, "SKIPPED", "1")
            .capture();
        assert_eq!(spec.env, vec![("CI".to_string(), "1".to_string())]);
        assert_eq!(spec.mode, OutputMode::Capture);
    }

    #[cfg(unix)]
    #[test]
    fn shell_runner_captures_stdout() {
        let runner = ShellRunner::new(ShellKind::Sh);
        let out = runner
            .run(&CommandSpec::new("echo hello").capture())
            .unwrap();
        assert!(out.success);
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout, "hello");
    }

    #[cfg(unix)]
    #[test]
    fn shell_runner_reports_exit_code_on_failure() {
        let runner = ShellRunner::new(ShellKind::Sh);
        let err = runner
            .run(&CommandSpec::new("echo nope >&2; exit 3").capture())
            .unwrap_err();
        assert_eq!(err.code.as_str(), "command.failed");
        assert_eq!(err.command_exit_code(), Some(3));
        assert_eq!(err.command_output(), "nope");
    }

    #[cfg(unix)]
    #[test]
    fn shell_runner_applies_cwd_and_env() {
        let dir = tempfile::TempDir::new().unwrap();
        let runner = ShellRunner::new(ShellKind::Sh);
        let out = runner
            .run(
                &CommandSpec::new("printf '%s' \"$SHIPYARD_PROBE\"; pwd")
                    .in_dir(dir.path())
                    .env("SHIPYARD_PROBE", "set")
                    .capture(),
            )
            .unwrap();
        assert!(out.stdout.starts_with("set"));
        let canonical = dir.path().canonicalize().unwrap();
        assert!(out
            .stdout
            .contains(canonical.file_name().unwrap().to_str().unwrap()));
    }

    #[cfg(unix)]
    #[test]
    fn shell_runner_streams_without_capturing() {
        let runner = ShellRunner::new(ShellKind::Sh);
        let out = runner.run(&CommandSpec::new("true")).unwrap();
        assert!(out.success);
        assert!(out.stdout.is_empty());
    }

    #[test]
    fn missing_interpreter_is_spawn_failure() {
        // PowerShell is rarely installed on CI Linux hosts; skip when it is.
        if cfg!(windows) || which_pwsh() {
            return;
        }
        let runner = ShellRunner::new(ShellKind::PowerShell);
        let err = runner.run(&CommandSpec::new("exit 0").capture()).unwrap_err();
        assert_eq!(err.code.as_str(), "command.spawn_failed");
    }

    fn which_pwsh() -> bool {
        std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|p| p.join("pwsh").exists()))
            .unwrap_or(false)
    }
}
