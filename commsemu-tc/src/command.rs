//! Utilities for running external programs with [`tokio::process::Command`].

use std::{io, process, time::Duration};

use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no program given")]
    Empty,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("non-zero exit status ({}): {}", .0.status, .0.stderr.trim())]
    NonZero(Output),
    #[error("command did not finish within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone)]
pub struct Output {
    pub status: process::ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl From<process::Output> for Output {
    fn from(value: process::Output) -> Self {
        Self {
            status: value.status,
            stdout: String::from_utf8_lossy(&value.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&value.stderr).into_owned(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Spawns programs and waits for them, optionally through `sudo` and with a deadline.
///
/// A child that outlives the deadline is killed.
#[derive(Debug, Clone)]
pub struct Runner {
    sudo: bool,
    timeout: Option<Duration>,
}

impl Default for Runner {
    fn default() -> Self {
        Self { sudo: false, timeout: Some(Self::DEFAULT_TIMEOUT) }
    }
}

impl Runner {
    /// Deadline applied when none is configured.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new() -> Self {
        Self::default()
    }

    /// Run every program as `sudo -n <program>`. `-n` makes sudo fail instead of prompting.
    pub fn with_sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo;
        self
    }

    /// Sets the deadline for a single command. `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The full argument vector that [`Runner::run`] would spawn.
    pub fn command_line<S: AsRef<str>>(&self, program: &str, args: &[S]) -> Vec<String> {
        let mut argv = Vec::with_capacity(args.len() + 3);
        if self.sudo {
            argv.push("sudo".to_string());
            argv.push("-n".to_string());
        }
        argv.push(program.to_string());
        argv.extend(args.iter().map(|a| a.as_ref().to_string()));
        argv
    }

    /// Runs `program` with `args`, returning its output if it exited successfully.
    pub async fn run<S: AsRef<str>>(&self, program: &str, args: &[S]) -> Result<Output> {
        if program.trim().is_empty() {
            return Err(Error::Empty);
        }
        self.spawn(self.command_line(program, args)).await
    }

    async fn spawn(&self, argv: Vec<String>) -> Result<Output> {
        let mut iter = argv.iter();
        let program = iter.next().ok_or(Error::Empty)?;

        let mut cmd = Command::new(program);
        cmd.args(iter)
            .stdin(process::Stdio::null())
            .stderr(process::Stdio::piped())
            .stdout(process::Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(?cmd, "running command");

        let child = cmd.spawn()?;
        let output: Output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child.wait_with_output())
                .await
                .map_err(|_| Error::Timeout(timeout))??
                .into(),
            None => child.wait_with_output().await?.into(),
        };

        if !output.status.success() {
            tracing::debug!(?output.stderr, ?output.status, ?cmd, "command returned non-zero status");
            return Err(Error::NonZero(output));
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_with_sudo() {
        let runner = Runner::new().with_sudo(true);
        assert_eq!(runner.command_line("tc", &["qdisc", "show"]), ["sudo", "-n", "tc", "qdisc", "show"]);

        let runner = Runner::new();
        assert_eq!(runner.command_line("tc", &["qdisc"]), ["tc", "qdisc"]);
    }

    #[tokio::test]
    async fn captures_stdout() {
        let output = Runner::new().run("echo", &["hello"]).await.unwrap();
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn non_zero_is_an_error() {
        let err = Runner::new().run("sh", &["-c", "echo nope >&2; exit 3"]).await.unwrap_err();
        match err {
            Error::NonZero(output) => {
                assert_eq!(output.status.code(), Some(3));
                assert_eq!(output.stderr.trim(), "nope");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_command() {
        assert!(matches!(Runner::new().run::<&str>(" ", &[]).await, Err(Error::Empty)));
        // Nothing is spawned for an empty program, even under sudo.
        assert!(matches!(Runner::new().with_sudo(true).run::<&str>("", &[]).await, Err(Error::Empty)));
    }

    #[tokio::test]
    async fn missing_program_is_io() {
        let err = Runner::new().run::<&str>("commsemu-definitely-not-a-program", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn hung_command_times_out() {
        let runner = Runner::new().with_timeout(Some(Duration::from_millis(100)));
        let started = std::time::Instant::now();

        let err = runner.run("sleep", &["5"]).await.unwrap_err();

        assert!(matches!(err, Error::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
