use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigInvalidJson,
    ConfigInvalidValue,

    ValidationInvalidArgument,

    ManifestNotFound,
    ManifestInvalid,
    PlaygroundNotFound,

    CommandFailed,
    CommandSpawnFailed,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::ManifestNotFound => "manifest.not_found",
            ErrorCode::ManifestInvalid => "manifest.invalid",
            ErrorCode::PlaygroundNotFound => "playground.not_found",

            ErrorCode::CommandFailed => "command.failed",
            ErrorCode::CommandSpawnFailed => "command.spawn_failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidJsonDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathDetails {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSpawnFailedDetails {
    pub command: String,
    pub program: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
        }
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let problem = problem.into();
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.clone(),
            id,
            tried,
        });

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            format!("Invalid argument: {}", problem),
            details,
        )
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        let path = path.into();
        let details = to_details(ConfigInvalidJsonDetails {
            path: path.clone(),
            error: err.to_string(),
        });

        Self::new(
            ErrorCode::ConfigInvalidJson,
            format!("Invalid JSON in configuration {}", path),
            details,
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let problem = problem.into();
        let details = to_details(ConfigInvalidValueDetails {
            key: key.into(),
            value,
            problem: problem.clone(),
        });

        Self::new(
            ErrorCode::ConfigInvalidValue,
            format!("Invalid configuration value: {}", problem),
            details,
        )
    }

    pub fn manifest_not_found(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::ManifestNotFound,
            format!("Manifest not found: {}", path),
            to_details(PathDetails {
                path,
                problem: None,
            }),
        )
        .with_hint("Run from the repository root or pass --path <dir>")
    }

    pub fn manifest_invalid(path: impl Into<String>, problem: impl Into<String>) -> Self {
        let path = path.into();
        let problem = problem.into();
        Self::new(
            ErrorCode::ManifestInvalid,
            format!("Invalid manifest {}: {}", path, problem),
            to_details(PathDetails {
                path,
                problem: Some(problem),
            }),
        )
    }

    pub fn playground_not_found(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::PlaygroundNotFound,
            format!("Playground directory not found: {}", path),
            to_details(PathDetails {
                path,
                problem: None,
            }),
        )
        .with_hint("Set playground.root in shipyard.json or pass --root <dir>")
    }

    pub fn command_failed(details: CommandFailedDetails) -> Self {
        let message = format!(
            "Command failed with exit code {}: {}",
            details.exit_code, details.command
        );
        Self::new(ErrorCode::CommandFailed, message, to_details(details))
    }

    pub fn command_spawn_failed(
        command: impl Into<String>,
        program: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let program = program.into();
        let error = error.into();
        Self::new(
            ErrorCode::CommandSpawnFailed,
            format!("Failed to start {}: {}", program, error),
            to_details(CommandSpawnFailedDetails {
                command: command.into(),
                program,
                error,
            }),
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalIoErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalJsonErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    /// Attach an extra key to an object-shaped details payload.
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Value::Object(ref mut map) = self.details {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    /// Exit code reported by the failed command, if this is a command failure.
    pub fn command_exit_code(&self) -> Option<i32> {
        if self.code != ErrorCode::CommandFailed {
            return None;
        }
        self.details
            .get("exitCode")
            .and_then(Value::as_i64)
            .map(|code| code as i32)
    }

    /// Combined stdout/stderr captured from a failed command.
    pub fn command_output(&self) -> String {
        let field = |name: &str| {
            self.details
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let stdout = field("stdout");
        let stderr = field("stderr");
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, _) => stderr,
            (false, true) => stdout,
            (false, false) => format!("{}\n{}", stderr, stdout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(stdout: &str, stderr: &str) -> Error {
        Error::command_failed(CommandFailedDetails {
            command: "git push origin main".to_string(),
            exit_code: 1,
            cwd: None,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        })
    }

    #[test]
    fn command_failed_carries_exit_code() {
        let err = failed("", "rejected");
        assert_eq!(err.code.as_str(), "command.failed");
        assert_eq!(err.command_exit_code(), Some(1));
        assert!(err.message.contains("git push origin main"));
    }

    #[test]
    fn command_exit_code_is_none_for_other_codes() {
        let err = Error::internal_unexpected("boom");
        assert_eq!(err.command_exit_code(), None);
    }

    #[test]
    fn command_output_prefers_both_streams() {
        assert_eq!(failed("", "err").command_output(), "err");
        assert_eq!(failed("out", "").command_output(), "out");
        assert_eq!(failed("out", "err").command_output(), "err\nout");
    }

    #[test]
    fn with_detail_extends_object_details() {
        let err = failed("", "").with_detail("step", "push");
        assert_eq!(err.details["step"], "push");
    }
}
