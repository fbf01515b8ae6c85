//! CLI command building and discovery for the subprocess connector

use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{ConnectorError, Result};

/// How the agent CLI should be launched
#[derive(Debug, Clone)]
pub enum LaunchMode {
    /// Fresh headless session bound to a new session id
    Headless {
        /// Session id passed to the CLI's `--session-id` flag
        session_id: String,
    },
    /// Reattach to a previously paused session
    Resume {
        /// Session id passed to the CLI's `--resume` flag
        session_id: String,
    },
}

/// Builder for the headless agent CLI invocation
pub struct CommandBuilder<'a> {
    cli_path: &'a Path,
    mode: &'a LaunchMode,
    working_dir: Option<&'a Path>,
}

impl<'a> CommandBuilder<'a> {
    /// Create a new command builder
    pub fn new(cli_path: &'a Path, mode: &'a LaunchMode, working_dir: Option<&'a Path>) -> Self {
        Self {
            cli_path,
            mode,
            working_dir,
        }
    }

    /// Build the complete CLI command with redirected stdio and no shell
    /// window
    pub fn build(&self) -> Command {
        let mut cmd = Command::new(self.cli_path);

        // Headless/print mode: one instruction per stdin line, structured
        // output on stdout.
        cmd.arg("--print")
            .arg("--output-format")
            .arg("stream-json")
            .arg("--verbose");

        match self.mode {
            LaunchMode::Headless { session_id } => {
                cmd.arg("--session-id").arg(session_id);
            }
            LaunchMode::Resume { session_id } => {
                cmd.arg("--resume").arg(session_id);
            }
        }

        if let Some(dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(windows)]
        {
            // CREATE_NO_WINDOW: no console window for the child.
            cmd.creation_flags(0x0800_0000);
        }

        cmd
    }
}

/// Find the agent CLI binary.
///
/// # Errors
/// Returns `CliNotFound` when the binary is neither on PATH nor in the
/// common install locations.
pub fn find_cli() -> Result<PathBuf> {
    if let Ok(path) = which::which("claude") {
        return Ok(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| String::from("/root"));
    let locations = vec![
        PathBuf::from(home.clone()).join(".npm-global/bin/claude"),
        PathBuf::from("/usr/local/bin/claude"),
        PathBuf::from(home.clone()).join(".local/bin/claude"),
        PathBuf::from(home.clone()).join("node_modules/.bin/claude"),
        PathBuf::from(home).join(".yarn/bin/claude"),
    ];

    for path in locations {
        if path.exists() && path.is_file() {
            return Ok(path);
        }
    }

    Err(ConnectorError::cli_not_found())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_mode_carries_session_id() {
        let mode = LaunchMode::Headless {
            session_id: "abc".to_string(),
        };
        let cmd = CommandBuilder::new(Path::new("/usr/bin/claude"), &mode, None).build();
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.contains(&"--session-id".to_string()));
        assert!(args.contains(&"abc".to_string()));
    }

    #[test]
    fn resume_mode_uses_resume_flag() {
        let mode = LaunchMode::Resume {
            session_id: "abc".to_string(),
        };
        let cmd = CommandBuilder::new(Path::new("/usr/bin/claude"), &mode, None).build();
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.contains(&"--resume".to_string()));
    }
}
