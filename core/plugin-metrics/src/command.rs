//! Execution of plugin commands.
//!
//! The rest of the crate only sees the [`CommandRunner`] trait: give it the extra
//! environment variables of the invocation, get back what the process printed and
//! how it ended. [`ProcessRunner`] is the implementation that spawns real processes.

use std::{
    fmt,
    io::{self, Read},
    process::{Child, Command, ExitStatus, Stdio},
    sync::mpsc::{self, Receiver, RecvTimeoutError},
    thread,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PluginConfig;

/// How often a running process is polled when a timeout is set.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// The command of a plugin, as written in the configuration.
///
/// ```toml
/// command = "ruby /usr/local/bin/sample.rb --verbose"   # run through the shell
/// command = ["/usr/local/bin/sample", "--verbose"]      # executed directly
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    /// A command line, interpreted by the platform shell.
    Shell(String),
    /// A program followed by its arguments.
    Args(Vec<String>),
}

impl CommandSpec {
    /// Returns `true` if there is nothing to execute.
    pub fn is_empty(&self) -> bool {
        match self {
            CommandSpec::Shell(line) => line.trim().is_empty(),
            CommandSpec::Args(argv) => argv.first().is_none_or(|program| program.is_empty()),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandSpec::Shell(line) => f.write_str(line),
            CommandSpec::Args(argv) => f.write_str(&argv.join(" ")),
        }
    }
}

/// Error that can occur while running a command.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("the command is empty")]
    EmptyCommand,
    /// The process could not be spawned.
    #[error("failed to spawn process {0}")]
    Spawn(String, #[source] io::Error),
    /// The process has spawned but waiting for it has failed.
    #[error("failed to wait for the process")]
    Wait(#[source] io::Error),
    #[error("exit status {0}")]
    ExitCode(i32),
    #[error("the process was terminated by a signal")]
    Terminated,
    /// The process did not finish in time and has been killed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// What a command printed and how it ended.
#[derive(Debug, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// The exit code, if the process exited normally.
    pub exit_code: Option<i32>,
    /// Set when the process could not run or did not exit with status 0.
    pub error: Option<RunError>,
}

impl CommandOutput {
    /// Output of a process that exited with status 0.
    pub fn success(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code: Some(0),
            error: None,
        }
    }

    /// Output of a process that could not be run at all.
    pub fn failed(error: RunError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    /// Output of a process that exited with a nonzero code.
    pub fn exited(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        let error = (exit_code != 0).then_some(RunError::ExitCode(exit_code));
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code: Some(exit_code),
            error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    fn from_parts(waited: Result<ExitStatus, RunError>, stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        let (exit_code, error) = match waited {
            Ok(status) if status.success() => (status.code(), None),
            Ok(status) => match status.code() {
                Some(code) => (Some(code), Some(RunError::ExitCode(code))),
                None => (None, Some(RunError::Terminated)),
            },
            Err(e) => (None, Some(e)),
        };
        Self {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code,
            error,
        }
    }
}

/// Runs the command of a plugin.
pub trait CommandRunner {
    /// Printable form of the command, used in error messages.
    fn command_string(&self) -> String;

    /// Runs the command with additional environment variables.
    ///
    /// The variables are always set, even when their value is empty.
    fn run_with_env(&self, env: &[(&str, &str)]) -> CommandOutput;
}

impl<R: CommandRunner + ?Sized> CommandRunner for Box<R> {
    fn command_string(&self) -> String {
        (**self).command_string()
    }

    fn run_with_env(&self, env: &[(&str, &str)]) -> CommandOutput {
        (**self).run_with_env(env)
    }
}

/// Runs commands as child processes of the current process.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    command: CommandSpec,
    env: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(command: CommandSpec) -> Self {
        Self {
            command,
            env: Vec::new(),
            timeout: None,
        }
    }

    /// Builds a runner for the command, environment and timeout of a plugin.
    pub fn from_config(config: &PluginConfig) -> Self {
        Self::new(config.command.clone())
            .with_env(config.env.iter().map(|(k, v)| (k.clone(), v.clone())))
            .with_timeout(config.timeout)
    }

    /// Sets environment variables that are passed to every invocation.
    ///
    /// The variables given to [`CommandRunner::run_with_env`] take precedence.
    pub fn with_env(mut self, env: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(env);
        self
    }

    /// Kills the process if it runs for longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_command(&self) -> Result<Command, RunError> {
        if self.command.is_empty() {
            return Err(RunError::EmptyCommand);
        }
        let cmd = match &self.command {
            CommandSpec::Shell(line) => shell_command(line),
            CommandSpec::Args(argv) => {
                let (program, args) = argv.split_first().ok_or(RunError::EmptyCommand)?;
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
        };
        Ok(cmd)
    }
}

impl CommandRunner for ProcessRunner {
    fn command_string(&self) -> String {
        self.command.to_string()
    }

    fn run_with_env(&self, env: &[(&str, &str)]) -> CommandOutput {
        let mut cmd = match self.build_command() {
            Ok(cmd) => cmd,
            Err(e) => return CommandOutput::failed(e),
        };
        cmd.envs(self.env.iter().map(|(k, v)| (k, v)))
            .envs(env.iter().copied())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return CommandOutput::failed(RunError::Spawn(self.command_string(), e)),
        };
        log::trace!("spawned {} with pid {}", self.command, child.id());

        match self.timeout {
            None => match child.wait_with_output() {
                Ok(output) => CommandOutput::from_parts(Ok(output.status), output.stdout, output.stderr),
                Err(e) => CommandOutput::failed(RunError::Wait(e)),
            },
            Some(timeout) => wait_with_timeout(child, timeout),
        }
    }
}

#[cfg(unix)]
fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg(line);
    cmd
}

#[cfg(not(unix))]
fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(line);
    cmd
}

fn wait_with_timeout(mut child: Child, timeout: Duration) -> CommandOutput {
    // Drain both pipes while waiting, otherwise a chatty plugin blocks on a full pipe.
    let stdout = child.stdout.take().map(spawn_reader);
    let stderr = child.stderr.take().map(spawn_reader);
    let deadline = Instant::now() + timeout;

    let waited = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Ok(status),
            Ok(None) if Instant::now() >= deadline => {
                if let Err(e) = child.kill() {
                    log::warn!("failed to kill pid {} after timeout: {e}", child.id());
                }
                let _ = child.wait();
                break Err(RunError::Timeout(timeout));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => break Err(RunError::Wait(e)),
        }
    };

    if waited.is_err() {
        // Descendants of the killed process may still hold the pipes open,
        // waiting for the readers could block for an unbounded amount of time.
        return CommandOutput::from_parts(waited, Vec::new(), Vec::new());
    }

    // The process has exited, but a background descendant can keep the pipes open.
    let (Some(stdout), Some(stderr)) = (
        recv_before(stdout.as_ref(), deadline),
        recv_before(stderr.as_ref(), deadline),
    ) else {
        log::debug!("the output pipes of pid {} are still open after the timeout", child.id());
        return CommandOutput::from_parts(Err(RunError::Timeout(timeout)), Vec::new(), Vec::new());
    };
    CommandOutput::from_parts(waited, stdout, stderr)
}

/// Reads a pipe to the end in a background thread.
fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buf) {
            log::debug!("error while reading the output of a plugin: {e}");
        }
        // the receiver is gone if the deadline has passed
        let _ = tx.send(buf);
    });
    rx
}

/// Waits for the content of a pipe until `deadline`. Returns `None` if the deadline has passed.
fn recv_before(reader: Option<&Receiver<Vec<u8>>>, deadline: Instant) -> Option<Vec<u8>> {
    let Some(reader) = reader else {
        return Some(Vec::new());
    };
    match reader.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(buf) => Some(buf),
        Err(RecvTimeoutError::Disconnected) => Some(Vec::new()),
        Err(RecvTimeoutError::Timeout) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn command_string() {
        let shell = CommandSpec::Shell(String::from("echo hello | tr a-z A-Z"));
        assert_eq!(shell.to_string(), "echo hello | tr a-z A-Z");

        let args = CommandSpec::Args(vec![String::from("/usr/bin/printf"), String::from("%s\\n"), String::from("x")]);
        assert_eq!(args.to_string(), "/usr/bin/printf %s\\n x");
        assert_eq!(ProcessRunner::new(args).command_string(), "/usr/bin/printf %s\\n x");
    }

    #[test]
    fn empty_command() {
        assert!(CommandSpec::Shell(String::from("  ")).is_empty());
        assert!(CommandSpec::Args(vec![]).is_empty());
        assert!(CommandSpec::Args(vec![String::new(), String::from("arg")]).is_empty());
        assert!(!CommandSpec::Args(vec![String::from("true")]).is_empty());

        let output = ProcessRunner::new(CommandSpec::Args(vec![])).run_with_env(&[]);
        assert!(matches!(output.error, Some(RunError::EmptyCommand)));
        assert_eq!(output.exit_code, None);
    }

    #[test]
    fn output_constructors() {
        let ok = CommandOutput::exited("out", "", 0);
        assert!(ok.is_success());
        assert_eq!(ok.exit_code, Some(0));

        let ko = CommandOutput::exited("", "boom", 3);
        assert!(!ko.is_success());
        assert!(matches!(ko.error, Some(RunError::ExitCode(3))));
        assert_eq!(ko.stderr, "boom");
    }

    #[test]
    fn spec_deserialization() {
        #[derive(Deserialize)]
        struct Wrapper {
            command: CommandSpec,
        }

        let w: Wrapper = toml::from_str(r#"command = "sample.sh --verbose""#).unwrap();
        assert_eq!(w.command, CommandSpec::Shell(String::from("sample.sh --verbose")));

        let w: Wrapper = toml::from_str(r#"command = ["sample", "--verbose"]"#).unwrap();
        assert_eq!(
            w.command,
            CommandSpec::Args(vec![String::from("sample"), String::from("--verbose")])
        );
    }

    #[cfg(unix)]
    mod process {
        use super::super::*;
        use pretty_assertions::assert_eq;

        fn sh(script: &str) -> ProcessRunner {
            ProcessRunner::new(CommandSpec::Shell(String::from(script)))
        }

        #[test]
        fn captures_stdout_and_stderr() {
            let output = sh("echo out; echo err >&2").run_with_env(&[]);
            assert!(output.is_success(), "{:?}", output.error);
            assert_eq!(output.stdout, "out\n");
            assert_eq!(output.stderr, "err\n");
            assert_eq!(output.exit_code, Some(0));
        }

        #[test]
        fn nonzero_exit() {
            let output = sh("echo partial; exit 3").run_with_env(&[]);
            assert!(matches!(output.error, Some(RunError::ExitCode(3))));
            assert_eq!(output.exit_code, Some(3));
            assert_eq!(output.stdout, "partial\n");
        }

        #[test]
        fn empty_variable_is_set() {
            let script = r#"if [ -z "${MODE+set}" ]; then echo absent; else echo "present:$MODE"; fi"#;
            let runner = sh(script);
            assert_eq!(runner.run_with_env(&[("MODE", "")]).stdout, "present:\n");
            assert_eq!(runner.run_with_env(&[("MODE", "1")]).stdout, "present:1\n");
            assert_eq!(runner.run_with_env(&[]).stdout, "absent\n");
        }

        #[test]
        fn invocation_env_wins_over_configured_env() {
            let runner = sh("echo \"$A $B\"").with_env([
                (String::from("A"), String::from("configured")),
                (String::from("B"), String::from("configured")),
            ]);
            assert_eq!(runner.run_with_env(&[("B", "invocation")]).stdout, "configured invocation\n");
        }

        #[test]
        fn argv_is_not_interpreted_by_the_shell() {
            let runner = ProcessRunner::new(CommandSpec::Args(vec![
                String::from("echo"),
                String::from("$HOME;"),
                String::from("a b"),
            ]));
            assert_eq!(runner.run_with_env(&[]).stdout, "$HOME; a b\n");
        }

        #[test]
        fn spawn_failure() {
            let runner = ProcessRunner::new(CommandSpec::Args(vec![String::from("/nonexistent/plugin-binary")]));
            let output = runner.run_with_env(&[]);
            assert!(matches!(output.error, Some(RunError::Spawn(_, _))));
            assert_eq!(output.exit_code, None);
        }

        #[test]
        fn timeout_kills_the_process() {
            let runner = ProcessRunner::new(CommandSpec::Args(vec![String::from("sleep"), String::from("5")]))
                .with_timeout(Some(Duration::from_millis(100)));
            let start = Instant::now();
            let output = runner.run_with_env(&[]);
            assert!(matches!(output.error, Some(RunError::Timeout(_))));
            assert!(start.elapsed() < Duration::from_secs(4));
        }

        #[test]
        fn timeout_with_background_descendant() {
            let runner = sh("sleep 3 & echo started").with_timeout(Some(Duration::from_millis(300)));
            let start = Instant::now();
            let output = runner.run_with_env(&[]);
            assert!(matches!(output.error, Some(RunError::Timeout(_))), "{:?}", output.error);
            assert!(start.elapsed() < Duration::from_secs(2));
        }

        #[test]
        fn fast_process_with_timeout() {
            let output = sh("echo fast").with_timeout(Some(Duration::from_secs(5))).run_with_env(&[]);
            assert!(output.is_success(), "{:?}", output.error);
            assert_eq!(output.stdout, "fast\n");
        }
    }
}
