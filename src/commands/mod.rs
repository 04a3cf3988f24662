use std::path::PathBuf;

use shipyard::config::ShipyardConfig;
use shipyard::{Error, ShellKind};

pub type CmdResult<T> = shipyard::Result<(T, i32)>;

pub mod deploy;
pub mod playground;

/// Expand `~` and require an existing directory.
pub(crate) fn resolve_dir(field: &str, raw: &str) -> shipyard::Result<PathBuf> {
    let expanded = shellexpand::tilde(raw).to_string();
    let path = PathBuf::from(&expanded);
    if !path.is_dir() {
        return Err(Error::validation_invalid_argument(
            field,
            format!("Not a directory: {}", expanded),
            Some(raw.to_string()),
            None,
        ));
    }
    Ok(path)
}

/// `--shell` wins over the config file, which wins over the platform default.
pub(crate) fn resolve_shell(flag: Option<&str>, config: &ShipyardConfig) -> shipyard::Result<ShellKind> {
    match flag {
        Some(raw) => raw.parse(),
        None => Ok(config.shell()),
    }
}

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args))
    };
}

pub(crate) fn run_json(command: crate::Commands) -> (shipyard::Result<serde_json::Value>, i32) {
    crate::tty::status("shipyard is working...");

    match command {
        crate::Commands::Deploy(args) => dispatch!(args, deploy),
        crate::Commands::Playground(args) => dispatch!(args, playground),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn resolve_dir_accepts_existing_directory() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().to_string_lossy().to_string();
        assert_eq!(resolve_dir("path", &raw).unwrap(), dir.path());
    }

    #[test]
    fn resolve_dir_rejects_missing_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope").to_string_lossy().to_string();
        let err = resolve_dir("path", &missing).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }

    #[test]
    fn resolve_shell_prefers_flag() {
        let mut config = ShipyardConfig::default();
        config.shell = Some(ShellKind::Cmd);
        assert_eq!(resolve_shell(Some("pwsh"), &config).unwrap(), ShellKind::PowerShell);
        assert_eq!(resolve_shell(None, &config).unwrap(), ShellKind::Cmd);
        assert!(resolve_shell(Some("zsh"), &config).is_err());
    }
}
