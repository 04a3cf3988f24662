// Public modules
pub mod config;
pub mod error;
pub mod manifest;
pub mod playground;
pub mod release;
pub mod runner;
pub mod version;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
pub use runner::{CommandRunner, CommandSpec, ShellKind, ShellRunner, StepOutput};
