//! External Commands
//!
//! The AI program itself, and the optional pause/resume hooks an external
//! supervisor can use to freeze the child outside the timed window.

use std::fmt;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{info, warn};

/// Program plus arguments. Run directly; [`AiCommand::shell`] wraps a line in `sh -c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiCommand {
    /// Executable path or name.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
}

impl AiCommand {
    /// A command with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// A command line handed to `sh -c`, so quoting and redirection work.
    /// `None` for a blank line.
    pub fn shell(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        Some(Self::new("sh").args(["-c", line]))
    }

    /// Split a command line on whitespace. `None` for a blank line.
    ///
    /// No quoting is understood: `a "b c"` yields the arguments `"b` and
    /// `c"`. Use [`AiCommand::shell`] for anything that needs it.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let program = words.next()?;
        Some(Self::new(program).args(words))
    }

    pub(crate) fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

impl fmt::Display for AiCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Which supervisor hook is being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Right after a wait on the child resolves.
    Pause,
    /// Right before the next wait begins.
    Resume,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookKind::Pause => "pause",
            HookKind::Resume => "resume",
        })
    }
}

/// Run a hook to completion. The outcome is logged, never acted on.
pub async fn run_hook(kind: HookKind, player: &str, hook: &AiCommand) {
    let status = hook.command().stdin(Stdio::null()).status().await;
    match status {
        Ok(status) => info!("[{}] ({}) return code: {:?}", kind, player, status.code()),
        Err(e) => warn!("[{}] ({}) could not run `{}`: {}", kind, player, hook, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_line() {
        let cmd = AiCommand::parse("  ./ai --depth 3 ").unwrap();
        assert_eq!(cmd.program, "./ai");
        assert_eq!(cmd.args, vec!["--depth", "3"]);
        assert_eq!(cmd.to_string(), "./ai --depth 3");
        assert!(AiCommand::parse("   ").is_none());
    }

    #[test]
    fn test_shell_keeps_quoted_arguments() {
        let cmd = AiCommand::shell(" kill -STOP \"$(cat ai.pid)\" ").unwrap();
        assert_eq!(cmd.program, "sh");
        assert_eq!(cmd.args, vec!["-c", "kill -STOP \"$(cat ai.pid)\""]);
        assert!(AiCommand::shell("\t").is_none());
    }

    #[test]
    fn test_builder() {
        let cmd = AiCommand::new("sh").arg("-c").args(["exit 0"]);
        assert_eq!(cmd.args, vec!["-c", "exit 0"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hook_failures_are_swallowed() {
        run_hook(HookKind::Pause, "p1", &AiCommand::new("/nonexistent/hook")).await;
        run_hook(HookKind::Resume, "p1", &AiCommand::new("true")).await;
    }
}
